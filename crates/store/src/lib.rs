//! # Inventory Store
//!
//! File-backed document collections for the inventory index, and the
//! single-writer queue that protects them.
//!
//! ## Layout on disk
//!
//! ```text
//! <store dir>/
//!     ├── snapshot.json    full collections, replaced atomically on compaction
//!     └── journal.jsonl    committed write ops since the snapshot, one per line
//! ```
//!
//! ## Access
//!
//! ```text
//! callers ──submit(unit of work)──> WriteQueue ──> writer thread ──> StoreWriter
//!                                                                     │
//! readers <──────────── IndexStore (shared lock, consistent reads) <──┘
//! ```
//!
//! [`IndexStore::open`] hands out exactly one [`StoreWriter`]; pass it to
//! [`WriteQueue::start`] and keep only the cloneable [`IndexStore`] read
//! handle anywhere else.
//!
//! ## Example
//!
//! ```no_run
//! use inventory_store::{IndexStore, StoreOptions, WriteQueue, WriteQueueConfig};
//!
//! #[tokio::main]
//! async fn main() -> inventory_store::Result<()> {
//!     let (store, writer) = IndexStore::open("data/index", StoreOptions::default())?;
//!     let queue = WriteQueue::start(writer, WriteQueueConfig::default())?;
//!
//!     let journal_len = queue.execute(|w| Ok(w.journal_len())).await?;
//!     println!("{journal_len} pending journal entries, {:?}", store.counts());
//!
//!     queue.shutdown().await;
//!     Ok(())
//! }
//! ```

mod collections;
mod error;
mod journal;
mod ops;
mod queue;
mod snapshot;
mod store;

pub use collections::Collections;
pub use error::{Result, StoreError};
pub use ops::WriteOp;
pub use queue::{
    QueueState, QueueStats, ShutdownOutcome, WriteHandle, WriteQueue, WriteQueueConfig,
};
pub use snapshot::SNAPSHOT_SCHEMA_VERSION;
pub use store::{IndexStore, StoreCounts, StoreOptions, StoreWriter};
