use crate::unit::{PriceSummary, UnitDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDocument {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub address: String,
    pub star_rating: u8,
    pub average_rating: f64,
    pub base_price: PriceSummary,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    pub property_type: String,
    pub is_featured: bool,
    #[serde(default)]
    pub dynamic_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub unit_count: u32,
    #[serde(default)]
    pub available_unit_count: u32,
    #[serde(default)]
    pub max_capacity: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl PropertyDocument {
    /// Recompute every field derived from the property's unit set.
    ///
    /// Returns `true` when anything changed.
    pub fn apply_unit_aggregates(&mut self, units: &[UnitDocument]) -> bool {
        let unit_count = units.len() as u32;
        let available_unit_count = units.iter().filter(|u| u.is_available).count() as u32;
        let max_capacity = units.iter().map(|u| u.max_capacity).max().unwrap_or(0);
        let price = units
            .iter()
            .fold(PriceSummary::flat(self.base_price.base), |acc, unit| {
                acc.widen(&unit.pricing)
            });

        let changed = self.unit_count != unit_count
            || self.available_unit_count != available_unit_count
            || self.max_capacity != max_capacity
            || self.base_price != price;

        self.unit_count = unit_count;
        self.available_unit_count = available_unit_count;
        self.max_capacity = max_capacity;
        self.base_price = price;
        changed
    }

    #[must_use]
    pub fn has_available_units(&self) -> bool {
        self.available_unit_count > 0
    }
}
