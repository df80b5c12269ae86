use serde::Serialize;

/// Outcome of one full rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub properties: usize,
    pub units: usize,
    pub sections: usize,
    /// Documents written because they were new or differed from the store.
    pub written: usize,
    /// Documents already identical to their projection.
    pub unchanged: usize,
    /// Documents deleted because their entity is gone from the source.
    pub deleted: usize,
    /// Unit records whose property does not exist.
    pub orphans_pruned: usize,
    pub duration_ms: u64,
}

impl RebuildStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn documents(&self) -> usize {
        self.properties + self.units
    }
}
