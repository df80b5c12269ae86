use crate::error::IndexerError;
use crate::service::IndexingService;
use crate::stats::RebuildStats;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Launch the startup rebuild without blocking startup.
///
/// Queries serve whatever the store already holds until it finishes. The
/// task resolves to the rebuild's stats, or `None` when it failed or was
/// cancelled; failures are logged and recorded in health.
pub fn spawn_startup_rebuild(
    service: IndexingService,
    cancel: CancellationToken,
) -> JoinHandle<Option<RebuildStats>> {
    tokio::spawn(async move {
        info!("Starting background index rebuild");
        match service.rebuild_index(&cancel).await {
            Ok(stats) => Some(stats),
            Err(IndexerError::Cancelled) => {
                info!("Startup rebuild cancelled");
                None
            }
            Err(err) => {
                error!("Startup rebuild failed; serving the last indexed state: {err}");
                None
            }
        }
    })
}
