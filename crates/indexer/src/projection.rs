//! Source records → index documents.

use crate::source::{PricingRule, PropertyRecord, SectionRecord, UnitRecord};
use inventory_documents::{
    AvailabilityRanges, DateRange, PriceSummary, PropertyDocument, SectionDocument, UnitDocument,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Price envelope of `base` widened by every rule price.
#[must_use]
pub fn price_summary(base: Decimal, rules: &[PricingRule]) -> PriceSummary {
    rules
        .iter()
        .fold(PriceSummary::flat(base), |acc, rule| {
            acc.widen(&PriceSummary::flat(rule.price))
        })
}

#[must_use]
pub fn project_unit(
    record: &UnitRecord,
    windows: Vec<DateRange>,
    rules: &[PricingRule],
) -> UnitDocument {
    UnitDocument {
        id: record.id,
        property_id: record.property_id,
        unit_type_id: record.unit_type_id,
        name: record.name.clone(),
        is_available: record.is_available,
        max_capacity: record.max_capacity,
        availability: AvailabilityRanges::normalize(windows),
        pricing: price_summary(record.base_price, rules),
        currency: record.currency.clone(),
        dynamic_fields: record.dynamic_fields.clone(),
        main_image_url: record.main_image_url.clone(),
        image_urls: record.image_urls.clone(),
        version: 0,
    }
}

/// Project a property together with the documents of its units.
///
/// The property's dynamic fields are the union of its units' fields; when
/// units disagree on a value the unit with the lowest id wins.
#[must_use]
pub fn project_property(record: &PropertyRecord, units: &[UnitDocument]) -> PropertyDocument {
    let mut ordered: Vec<&UnitDocument> = units.iter().collect();
    ordered.sort_by_key(|u| u.id);
    let mut dynamic_fields = BTreeMap::new();
    for unit in ordered {
        for (name, value) in &unit.dynamic_fields {
            dynamic_fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    let mut doc = PropertyDocument {
        id: record.id,
        name: record.name.clone(),
        city: record.city.clone(),
        address: record.address.clone(),
        star_rating: record.star_rating,
        average_rating: record.average_rating,
        base_price: PriceSummary::flat(record.base_price),
        currency: record.currency.clone(),
        main_image_url: record.main_image_url.clone(),
        image_urls: record.image_urls.clone(),
        amenities: record.amenities.clone(),
        property_type: record.property_type.clone(),
        is_featured: record.is_featured,
        dynamic_fields,
        unit_count: 0,
        available_unit_count: 0,
        max_capacity: 0,
        updated_at: record.updated_at,
        version: 0,
    };
    doc.apply_unit_aggregates(units);
    doc
}

#[must_use]
pub fn project_section(record: &SectionRecord) -> SectionDocument {
    let mut items = record.items.clone();
    items.sort_by_key(|item| item.sort_order);
    SectionDocument {
        id: record.id,
        target: record.target,
        display_order: record.display_order,
        items: items.into_iter().map(|item| item.item_id).collect(),
        version: 0,
    }
}

/// Compare two documents of the same kind ignoring their store versions.
pub(crate) fn same_content<T: Clone + PartialEq>(
    current: &T,
    candidate: &T,
    strip: impl Fn(&mut T),
) -> bool {
    let mut a = current.clone();
    let mut b = candidate.clone();
    strip(&mut a);
    strip(&mut b);
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SectionItemRecord;
    use chrono::{NaiveDate, Utc};
    use inventory_documents::SectionTarget;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn unit_record(property_id: Uuid, fields: &[(&str, &str)]) -> UnitRecord {
        UnitRecord {
            id: Uuid::new_v4(),
            property_id,
            unit_type_id: Uuid::new_v4(),
            name: "Suite".to_string(),
            is_available: true,
            max_capacity: 3,
            base_price: Decimal::new(100, 0),
            currency: "YER".to_string(),
            dynamic_fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            main_image_url: None,
            image_urls: Vec::new(),
        }
    }

    #[test]
    fn unit_projection_merges_windows_and_prices() {
        let record = unit_record(Uuid::new_v4(), &[]);
        let windows = vec![
            DateRange::new(day(5), day(9)).unwrap(),
            DateRange::new(day(1), day(6)).unwrap(),
        ];
        let rules = vec![
            PricingRule {
                unit_id: record.id,
                window: DateRange::new(day(1), day(3)).unwrap(),
                price: Decimal::new(80, 0),
            },
            PricingRule {
                unit_id: record.id,
                window: DateRange::new(day(3), day(4)).unwrap(),
                price: Decimal::new(150, 0),
            },
        ];

        let doc = project_unit(&record, windows, &rules);
        assert_eq!(doc.availability.as_slice(), &[DateRange::new(day(1), day(9)).unwrap()]);
        assert_eq!(
            doc.pricing,
            PriceSummary {
                base: Decimal::new(100, 0),
                min: Decimal::new(80, 0),
                max: Decimal::new(150, 0),
            }
        );
    }

    #[test]
    fn property_projection_unions_unit_fields() {
        let property_id = Uuid::new_v4();
        let record = PropertyRecord {
            id: property_id,
            name: "Seiyun Palace".to_string(),
            city: "Seiyun".to_string(),
            address: String::new(),
            star_rating: 5,
            average_rating: 4.8,
            base_price: Decimal::new(120, 0),
            currency: "YER".to_string(),
            main_image_url: None,
            image_urls: Vec::new(),
            amenities: Default::default(),
            property_type: "resort".to_string(),
            is_featured: true,
            updated_at: Utc::now(),
        };
        let units: Vec<UnitDocument> = [
            unit_record(property_id, &[("Wifi", "yes")]),
            unit_record(property_id, &[("View", "sea")]),
        ]
        .iter()
        .map(|r| project_unit(r, Vec::new(), &[]))
        .collect();

        let doc = project_property(&record, &units);
        assert_eq!(doc.dynamic_fields.len(), 2);
        assert_eq!(doc.unit_count, 2);
        assert_eq!(doc.max_capacity, 3);
        assert_eq!(doc.base_price.min, Decimal::new(100, 0));
        assert_eq!(doc.base_price.max, Decimal::new(120, 0));
    }

    #[test]
    fn section_items_follow_sort_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let record = SectionRecord {
            id: Uuid::new_v4(),
            target: SectionTarget::Units,
            display_order: 2,
            items: vec![
                SectionItemRecord { item_id: a, sort_order: 3 },
                SectionItemRecord { item_id: b, sort_order: 1 },
                SectionItemRecord { item_id: c, sort_order: 2 },
            ],
        };
        assert_eq!(project_section(&record).items, vec![b, c, a]);
    }
}
