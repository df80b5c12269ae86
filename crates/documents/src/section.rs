use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which document collection a listing section draws its items from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionTarget {
    Properties,
    Units,
}

/// A curated listing section: item ids in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDocument {
    pub id: Uuid,
    pub target: SectionTarget,
    pub display_order: i32,
    #[serde(default)]
    pub items: Vec<Uuid>,
    #[serde(default)]
    pub version: u64,
}
