//! # Inventory Documents
//!
//! Read-optimized projections of bookable inventory.
//!
//! ## Shape
//!
//! ```text
//! PropertyDocument
//!     │  name, city, rating, price summary, images, amenities,
//!     │  dynamic fields, unit aggregates
//!     │
//!     └──< UnitDocument
//!            availability ranges, pricing summary, dynamic fields
//!
//! SectionDocument
//!     ordered item ids (properties or units) for a listing section
//! ```
//!
//! Every document carries a `version` assigned by the index store. Queries
//! hand documents out as [`IndexedDocument`], a tagged variant resolved at
//! the query boundary.

mod document;
mod error;
mod filter;
mod page;
mod property;
mod range;
mod section;
mod unit;

pub use document::{DocumentKey, IndexedDocument};
pub use error::{DocumentError, Result};
pub use filter::ListingFilter;
pub use page::Page;
pub use property::PropertyDocument;
pub use range::{AvailabilityRanges, DateRange};
pub use section::{SectionDocument, SectionTarget};
pub use unit::{PriceSummary, UnitDocument};

pub use chrono::{DateTime, NaiveDate, Utc};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
