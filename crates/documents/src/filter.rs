use crate::document::IndexedDocument;
use crate::property::PropertyDocument;
use crate::range::DateRange;
use crate::unit::UnitDocument;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Structured listing filter. Unset criteria match everything.
///
/// `city`, `property_type`, `featured_only`, `min_star_rating` and
/// `amenities` only constrain property documents; `property_id` only
/// constrains unit documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingFilter {
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub property_id: Option<Uuid>,
    pub featured_only: bool,
    pub min_star_rating: Option<u8>,
    pub min_capacity: Option<u32>,
    pub max_price: Option<Decimal>,
    pub stay: Option<DateRange>,
    pub amenities: BTreeSet<String>,
    pub dynamic_fields: BTreeMap<String, String>,
}

impl ListingFilter {
    #[must_use]
    pub fn matches(&self, doc: &IndexedDocument) -> bool {
        match doc {
            IndexedDocument::Property(p) => self.matches_property(p),
            IndexedDocument::Unit(u) => self.matches_unit(u),
        }
    }

    /// Checks the property's own fields. For `stay` that is only "has a
    /// bookable unit"; which dates those units cover is up to the caller.
    #[must_use]
    pub fn matches_property(&self, doc: &PropertyDocument) -> bool {
        if let Some(city) = &self.city {
            if !doc.city.eq_ignore_ascii_case(city) {
                return false;
            }
        }
        if let Some(kind) = &self.property_type {
            if !doc.property_type.eq_ignore_ascii_case(kind) {
                return false;
            }
        }
        if self.featured_only && !doc.is_featured {
            return false;
        }
        if self.min_star_rating.is_some_and(|min| doc.star_rating < min) {
            return false;
        }
        if self.min_capacity.is_some_and(|min| doc.max_capacity < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| doc.base_price.min > max) {
            return false;
        }
        if self.stay.is_some() && !doc.has_available_units() {
            return false;
        }
        if !self.amenities.iter().all(|a| doc.amenities.contains(a)) {
            return false;
        }
        fields_match(&self.dynamic_fields, &doc.dynamic_fields)
    }

    #[must_use]
    pub fn matches_unit(&self, doc: &UnitDocument) -> bool {
        if self.property_id.is_some_and(|id| doc.property_id != id) {
            return false;
        }
        if self.min_capacity.is_some_and(|min| doc.max_capacity < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| doc.pricing.min > max) {
            return false;
        }
        if let Some(stay) = &self.stay {
            if !doc.is_available || !doc.availability.covers(stay) {
                return false;
            }
        }
        fields_match(&self.dynamic_fields, &doc.dynamic_fields)
    }
}

fn fields_match(wanted: &BTreeMap<String, String>, actual: &BTreeMap<String, String>) -> bool {
    wanted
        .iter()
        .all(|(name, value)| actual.get(name).is_some_and(|v| v == value))
}
