use crate::range::AvailabilityRanges;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Nightly price envelope: the declared base price and the lowest/highest
/// price any active pricing rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PriceSummary {
    pub base: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceSummary {
    #[must_use]
    pub fn flat(base: Decimal) -> Self {
        Self {
            base,
            min: base,
            max: base,
        }
    }

    /// Widen the envelope so it also spans `other`.
    #[must_use]
    pub fn widen(self, other: &PriceSummary) -> Self {
        Self {
            base: self.base,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDocument {
    pub id: Uuid,
    pub property_id: Uuid,
    pub unit_type_id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub max_capacity: u32,
    #[serde(default)]
    pub availability: AvailabilityRanges,
    pub pricing: PriceSummary,
    pub currency: String,
    #[serde(default)]
    pub dynamic_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub version: u64,
}
