//! # Inventory Indexer
//!
//! Keeps the denormalized inventory index in step with the systems of
//! record and serves listing queries from it.
//!
//! ## Pipeline
//!
//! ```text
//! Sources (properties, units, availability, pricing, sections)
//!     │
//!     ├──> Rebuild (full projection, bijective with the sources)
//!     │      └─> one write-queue unit per entity
//!     │
//!     ├──> Incremental hooks (after each relational commit)
//!     │      └─> read-modify-write inside one unit of work
//!     │
//!     └──> Index store ──> Read cache ──> get_by_id / list_by_section / search
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use inventory_indexer::{IndexerConfig, IndexingService, InMemorySources, Sources};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> inventory_indexer::Result<()> {
//!     let sources = Arc::new(InMemorySources::from_seed_file("seed.json".as_ref())?);
//!     let config = IndexerConfig::load(None)?;
//!     let service = IndexingService::open(config, Sources::from_shared(sources))?;
//!
//!     let stats = service.rebuild_index(&CancellationToken::new()).await?;
//!     println!("Indexed {} properties, {} units", stats.properties, stats.units);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

mod background;
mod cache;
mod config;
mod error;
mod health;
mod hooks;
mod projection;
mod service;
mod source;
mod stats;

pub use background::spawn_startup_rebuild;
pub use cache::{CacheKey, CacheStats, IndexCache, ReadCache};
pub use config::{IndexerConfig, ENV_PREFIX};
pub use error::{IndexerError, Result};
pub use health::{IndexerHealth, RebuildHealth};
pub use hooks::HookDispatcher;
pub use projection::{price_summary, project_property, project_section, project_unit};
pub use service::{HookOutcome, IndexingService};
pub use source::{
    AvailabilityRecord, AvailabilitySource, InMemorySources, PricingRule, PricingSource,
    PropertyRecord, PropertySource, SectionItemRecord, SectionRecord, SectionSource, SeedData,
    SourceError, SourceResult, SourceSnapshot, Sources, UnitRecord, UnitSource,
};
pub use stats::RebuildStats;
