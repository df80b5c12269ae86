use crate::collections::Collections;
use crate::error::{Result, StoreError};
use inventory_documents::{PropertyDocument, SectionDocument, UnitDocument};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    schema_version: u32,
    written_at_unix_ms: u64,
    last_version: u64,
    properties: Vec<&'a PropertyDocument>,
    units: Vec<&'a UnitDocument>,
    sections: Vec<&'a SectionDocument>,
}

#[derive(Deserialize)]
pub(crate) struct PersistedSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub written_at_unix_ms: u64,
    pub last_version: u64,
    #[serde(default)]
    pub properties: Vec<PropertyDocument>,
    #[serde(default)]
    pub units: Vec<UnitDocument>,
    #[serde(default)]
    pub sections: Vec<SectionDocument>,
}

impl PersistedSnapshot {
    pub(crate) fn into_collections(self) -> Result<Collections> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                found: self.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        debug!(
            "Loading snapshot at version {} (written {} ms after epoch)",
            self.last_version, self.written_at_unix_ms
        );
        Ok(Collections::from_parts(
            self.properties,
            self.units,
            self.sections,
            self.last_version,
        ))
    }
}

/// Write the full collections to `path` atomically (tmp file + rename).
pub(crate) fn write_snapshot(path: &Path, collections: &Collections) -> Result<()> {
    let mut properties: Vec<_> = collections.properties().collect();
    properties.sort_by_key(|d| d.id);
    let mut units: Vec<_> = collections.units().collect();
    units.sort_by_key(|d| d.id);
    let mut sections: Vec<_> = collections.sections().collect();
    sections.sort_by_key(|d| d.id);

    let snapshot = SnapshotRef {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        written_at_unix_ms: unix_now_ms(),
        last_version: collections.last_version(),
        properties,
        units,
        sections,
    };

    let bytes = serde_json::to_vec(&snapshot)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read_snapshot(path: &Path) -> Result<Option<PersistedSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
