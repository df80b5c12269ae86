use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inventory_documents::{DateRange, SectionTarget};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{name} source unavailable: {reason}")]
    Unavailable { name: &'static str, reason: String },

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),
}

impl SourceError {
    pub fn unavailable(name: &'static str, reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            name,
            reason: reason.into(),
        }
    }
}

/// A property row as the system of record holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub star_rating: u8,
    #[serde(default)]
    pub average_rating: f64,
    pub base_price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    pub property_type: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: Uuid,
    pub property_id: Uuid,
    pub unit_type_id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub max_capacity: u32,
    pub base_price: Decimal,
    pub currency: String,
    /// Dynamic field values keyed by field name.
    #[serde(default)]
    pub dynamic_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One bookable window of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub unit_id: Uuid,
    pub window: DateRange,
}

/// Price override for a unit inside a date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub unit_id: Uuid,
    pub window: DateRange,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionItemRecord {
    pub item_id: Uuid,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: Uuid,
    pub target: SectionTarget,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub items: Vec<SectionItemRecord>,
}

#[async_trait]
pub trait PropertySource: Send + Sync {
    async fn list_properties(&self) -> SourceResult<Vec<PropertyRecord>>;
}

#[async_trait]
pub trait UnitSource: Send + Sync {
    async fn list_units(&self) -> SourceResult<Vec<UnitRecord>>;
}

#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn list_availability(&self) -> SourceResult<Vec<AvailabilityRecord>>;

    async fn availability_of(&self, unit_id: Uuid) -> SourceResult<Vec<DateRange>>;
}

#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn list_pricing_rules(&self) -> SourceResult<Vec<PricingRule>>;

    async fn pricing_rules_of(&self, unit_id: Uuid) -> SourceResult<Vec<PricingRule>>;
}

#[async_trait]
pub trait SectionSource: Send + Sync {
    async fn list_sections(&self) -> SourceResult<Vec<SectionRecord>>;
}

/// Complete state of every source, read at the start of a rebuild.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub properties: Vec<PropertyRecord>,
    pub units: Vec<UnitRecord>,
    pub availability: Vec<AvailabilityRecord>,
    pub pricing: Vec<PricingRule>,
    pub sections: Vec<SectionRecord>,
}

/// The read-only systems of record the index is projected from.
#[derive(Clone)]
pub struct Sources {
    pub properties: Arc<dyn PropertySource>,
    pub units: Arc<dyn UnitSource>,
    pub availability: Arc<dyn AvailabilitySource>,
    pub pricing: Arc<dyn PricingSource>,
    pub sections: Arc<dyn SectionSource>,
}

impl Sources {
    /// Use one object for every source.
    pub fn from_shared<S>(source: Arc<S>) -> Self
    where
        S: PropertySource
            + UnitSource
            + AvailabilitySource
            + PricingSource
            + SectionSource
            + 'static,
    {
        Self {
            properties: source.clone(),
            units: source.clone(),
            availability: source.clone(),
            pricing: source.clone(),
            sections: source,
        }
    }

    pub async fn load_snapshot(&self) -> SourceResult<SourceSnapshot> {
        let (properties, units, availability, pricing, sections) = tokio::try_join!(
            self.properties.list_properties(),
            self.units.list_units(),
            self.availability.list_availability(),
            self.pricing.list_pricing_rules(),
            self.sections.list_sections(),
        )?;
        Ok(SourceSnapshot {
            properties,
            units,
            availability,
            pricing,
            sections,
        })
    }
}

/// Seed file contents: every source's rows in one JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub properties: Vec<PropertyRecord>,
    pub units: Vec<UnitRecord>,
    pub availability: Vec<AvailabilityRecord>,
    pub pricing: Vec<PricingRule>,
    pub sections: Vec<SectionRecord>,
}

/// All sources backed by one in-memory data set.
///
/// Used by the admin binary (loaded from a seed file) and by tests, which
/// mutate it between rebuilds and can take it offline.
#[derive(Debug, Default)]
pub struct InMemorySources {
    data: RwLock<SeedData>,
    offline: AtomicBool,
}

impl InMemorySources {
    #[must_use]
    pub fn new(data: SeedData) -> Self {
        Self {
            data: RwLock::new(data),
            offline: AtomicBool::new(false),
        }
    }

    pub fn from_json(json: &str) -> SourceResult<Self> {
        let data: SeedData =
            serde_json::from_str(json).map_err(|e| SourceError::InvalidSeed(e.to_string()))?;
        Ok(Self::new(data))
    }

    pub fn from_seed_file(path: &Path) -> SourceResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SourceError::InvalidSeed(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// While offline every read fails with `SourceError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn upsert_property(&self, record: PropertyRecord) {
        let mut data = self.write();
        data.properties.retain(|p| p.id != record.id);
        data.properties.push(record);
    }

    pub fn remove_property(&self, id: Uuid) {
        self.write().properties.retain(|p| p.id != id);
    }

    pub fn upsert_unit(&self, record: UnitRecord) {
        let mut data = self.write();
        data.units.retain(|u| u.id != record.id);
        data.units.push(record);
    }

    pub fn remove_unit(&self, id: Uuid) {
        let mut data = self.write();
        data.units.retain(|u| u.id != id);
        data.availability.retain(|a| a.unit_id != id);
        data.pricing.retain(|r| r.unit_id != id);
    }

    /// Replace every availability window of `unit_id`.
    pub fn set_availability(&self, unit_id: Uuid, windows: Vec<DateRange>) {
        let mut data = self.write();
        data.availability.retain(|a| a.unit_id != unit_id);
        data.availability
            .extend(windows.into_iter().map(|window| AvailabilityRecord { unit_id, window }));
    }

    pub fn set_pricing_rules(&self, unit_id: Uuid, rules: Vec<PricingRule>) {
        let mut data = self.write();
        data.pricing.retain(|r| r.unit_id != unit_id);
        data.pricing.extend(rules);
    }

    pub fn upsert_section(&self, record: SectionRecord) {
        let mut data = self.write();
        data.sections.retain(|s| s.id != record.id);
        data.sections.push(record);
    }

    pub fn remove_section(&self, id: Uuid) {
        self.write().sections.retain(|s| s.id != id);
    }

    fn read_checked<T>(
        &self,
        name: &'static str,
        f: impl FnOnce(&SeedData) -> T,
    ) -> SourceResult<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable(name, "source is offline"));
        }
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&data))
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SeedData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PropertySource for InMemorySources {
    async fn list_properties(&self) -> SourceResult<Vec<PropertyRecord>> {
        self.read_checked("property", |d| d.properties.clone())
    }
}

#[async_trait]
impl UnitSource for InMemorySources {
    async fn list_units(&self) -> SourceResult<Vec<UnitRecord>> {
        self.read_checked("unit", |d| d.units.clone())
    }
}

#[async_trait]
impl AvailabilitySource for InMemorySources {
    async fn list_availability(&self) -> SourceResult<Vec<AvailabilityRecord>> {
        self.read_checked("availability", |d| d.availability.clone())
    }

    async fn availability_of(&self, unit_id: Uuid) -> SourceResult<Vec<DateRange>> {
        self.read_checked("availability", |d| {
            d.availability
                .iter()
                .filter(|a| a.unit_id == unit_id)
                .map(|a| a.window)
                .collect()
        })
    }
}

#[async_trait]
impl PricingSource for InMemorySources {
    async fn list_pricing_rules(&self) -> SourceResult<Vec<PricingRule>> {
        self.read_checked("pricing", |d| d.pricing.clone())
    }

    async fn pricing_rules_of(&self, unit_id: Uuid) -> SourceResult<Vec<PricingRule>> {
        self.read_checked("pricing", |d| {
            d.pricing
                .iter()
                .filter(|r| r.unit_id == unit_id)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl SectionSource for InMemorySources {
    async fn list_sections(&self) -> SourceResult<Vec<SectionRecord>> {
        self.read_checked("section", |d| d.sections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SEED: &str = r#"{
        "properties": [{
            "id": "8f7c2d1e-0000-4000-8000-000000000001",
            "name": "Dar Al Salam",
            "city": "Sanaa",
            "base_price": "45.00",
            "currency": "USD",
            "property_type": "hotel"
        }],
        "availability": [{
            "unit_id": "8f7c2d1e-0000-4000-8000-0000000000a1",
            "window": { "start": "2026-03-01", "end": "2026-03-10" }
        }]
    }"#;

    #[tokio::test]
    async fn seed_json_fills_defaults() {
        let sources = InMemorySources::from_json(SEED).unwrap();
        let properties = sources.list_properties().await.unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].star_rating, 0);
        assert!(properties[0].amenities.is_empty());
        assert_eq!(properties[0].base_price, Decimal::new(4500, 2));
        assert!(sources.list_units().await.unwrap().is_empty());
    }

    #[test]
    fn seed_rejects_inverted_window() {
        let bad = r#"{ "availability": [{
            "unit_id": "8f7c2d1e-0000-4000-8000-0000000000a1",
            "window": { "start": "2026-03-10", "end": "2026-03-01" }
        }] }"#;
        assert!(matches!(
            InMemorySources::from_json(bad),
            Err(SourceError::InvalidSeed(_))
        ));
    }

    #[tokio::test]
    async fn offline_sources_fail_every_read() {
        let sources = Arc::new(InMemorySources::from_json(SEED).unwrap());
        sources.set_offline(true);
        let all = Sources::from_shared(sources.clone());

        let err = all.load_snapshot().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));

        sources.set_offline(false);
        assert_eq!(all.load_snapshot().await.unwrap().availability.len(), 1);
    }
}
