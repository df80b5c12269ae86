use crate::cache::CacheStats;
use crate::stats::RebuildStats;
use chrono::{DateTime, Utc};
use inventory_store::{QueueStats, StoreCounts};
use serde::Serialize;
use tokio::sync::watch;

/// Rebuild bookkeeping, published on a watch channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildHealth {
    pub rebuilding: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_duration_ms: Option<u64>,
    pub last_stats: Option<RebuildStats>,
    pub hook_failures: u64,
}

/// Point-in-time view of the whole indexing pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerHealth {
    #[serde(flatten)]
    pub rebuild: RebuildHealth,
    pub queue: QueueStats,
    pub store: StoreCounts,
    pub cache: CacheStats,
}

impl IndexerHealth {
    /// Healthy once a rebuild has succeeded and none has failed since.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.rebuild.last_success.is_some() && self.rebuild.consecutive_failures == 0
    }
}

pub(crate) struct HealthTracker {
    tx: watch::Sender<RebuildHealth>,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(RebuildHealth::default());
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> RebuildHealth {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RebuildHealth> {
        self.tx.subscribe()
    }

    pub(crate) fn rebuild_started(&self) {
        self.tx.send_modify(|h| h.rebuilding = true);
    }

    pub(crate) fn rebuild_succeeded(&self, stats: &RebuildStats) {
        self.tx.send_modify(|h| {
            h.rebuilding = false;
            h.last_success = Some(Utc::now());
            h.last_error = None;
            h.consecutive_failures = 0;
            h.last_duration_ms = Some(stats.duration_ms);
            h.last_stats = Some(stats.clone());
        });
    }

    pub(crate) fn rebuild_failed(&self, error: String, duration_ms: u64) {
        self.tx.send_modify(|h| {
            h.rebuilding = false;
            h.last_error = Some(error);
            h.consecutive_failures = h.consecutive_failures.saturating_add(1);
            h.last_duration_ms = Some(duration_ms);
        });
    }

    pub(crate) fn hook_failed(&self) {
        self.tx.send_modify(|h| h.hook_failures += 1);
    }
}
