#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use inventory_documents::{DateRange, Decimal, NaiveDate, SectionTarget, Uuid};
use inventory_indexer::{
    AvailabilityRecord, IndexerConfig, IndexingService, InMemorySources, PricingRule,
    PropertyRecord, SectionItemRecord, SectionRecord, SeedData, Sources, UnitRecord,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const P1: Uuid = Uuid::from_u128(0x1001);
pub const P2: Uuid = Uuid::from_u128(0x1002);
pub const P3: Uuid = Uuid::from_u128(0x1003);
pub const P_MISSING: Uuid = Uuid::from_u128(0x10ff);

pub const U1: Uuid = Uuid::from_u128(0x2001);
pub const U2: Uuid = Uuid::from_u128(0x2002);
pub const U3: Uuid = Uuid::from_u128(0x2003);
pub const U4: Uuid = Uuid::from_u128(0x2004);
pub const U5: Uuid = Uuid::from_u128(0x2005);

pub const FEATURED: Uuid = Uuid::from_u128(0x3001);

pub struct Fixture {
    pub dir: TempDir,
    pub sources: Arc<InMemorySources>,
    pub service: IndexingService,
}

pub fn config_for(path: &Path) -> IndexerConfig {
    IndexerConfig {
        store_path: path.join("index"),
        queue_capacity: 8,
        shutdown_timeout_ms: 2_000,
        ..IndexerConfig::default()
    }
}

pub fn fixture_with(data: SeedData) -> Fixture {
    let dir = TempDir::new().unwrap();
    let sources = Arc::new(InMemorySources::new(data));
    let service =
        IndexingService::open(config_for(dir.path()), Sources::from_shared(sources.clone()))
            .unwrap();
    Fixture {
        dir,
        sources,
        service,
    }
}

/// Three properties, five units; U3 points at a property that does not exist.
pub fn fixture() -> Fixture {
    fixture_with(inventory())
}

pub fn inventory() -> SeedData {
    SeedData {
        properties: vec![
            property(P1, "Aden Bay Hotel", "Aden", true),
            property(P2, "Old Sanaa Inn", "Sanaa", false),
            property(P3, "Mukalla Shore", "Mukalla", false),
        ],
        units: vec![
            unit(U1, P1, "Sea View Room", 2, 100),
            unit(U2, P1, "Family Suite", 5, 180),
            unit(U3, P_MISSING, "Ghost Room", 2, 70),
            unit(U4, P2, "Courtyard Room", 3, 60),
            unit(U5, P3, "Beach Chalet", 4, 140),
        ],
        availability: vec![
            AvailabilityRecord {
                unit_id: U1,
                window: range(1, 5),
            },
            AvailabilityRecord {
                unit_id: U4,
                window: range(3, 9),
            },
        ],
        pricing: vec![PricingRule {
            unit_id: U2,
            window: range(10, 12),
            price: Decimal::new(220, 0),
        }],
        sections: vec![SectionRecord {
            id: FEATURED,
            target: SectionTarget::Properties,
            display_order: 1,
            items: vec![
                SectionItemRecord {
                    item_id: P3,
                    sort_order: 1,
                },
                SectionItemRecord {
                    item_id: P_MISSING,
                    sort_order: 2,
                },
                SectionItemRecord {
                    item_id: P1,
                    sort_order: 3,
                },
            ],
        }],
    }
}

pub fn property(id: Uuid, name: &str, city: &str, featured: bool) -> PropertyRecord {
    PropertyRecord {
        id,
        name: name.to_string(),
        city: city.to_string(),
        address: format!("{name} street"),
        star_rating: 4,
        average_rating: 4.2,
        base_price: Decimal::new(120, 0),
        currency: "YER".to_string(),
        main_image_url: None,
        image_urls: Vec::new(),
        amenities: ["pool".to_string()].into_iter().collect(),
        property_type: "hotel".to_string(),
        is_featured: featured,
        updated_at: Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
    }
}

pub fn unit(id: Uuid, property_id: Uuid, name: &str, capacity: u32, price: i64) -> UnitRecord {
    UnitRecord {
        id,
        property_id,
        unit_type_id: Uuid::from_u128(0x4001),
        name: name.to_string(),
        is_available: true,
        max_capacity: capacity,
        base_price: Decimal::new(price, 0),
        currency: "YER".to_string(),
        dynamic_fields: Default::default(),
        main_image_url: None,
        image_urls: Vec::new(),
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
}

pub fn range(start: u32, end: u32) -> DateRange {
    DateRange::new(day(start), day(end)).unwrap()
}
