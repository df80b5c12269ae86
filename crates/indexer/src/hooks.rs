use crate::error::Result;
use crate::service::{HookOutcome, IndexingService};
use log::{debug, warn};
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fire-and-forget incremental hooks.
///
/// Mutation handlers call this after their own commit; the hook runs as a
/// detached task and a failure is logged and counted in health, never
/// returned to the handler.
#[derive(Clone)]
pub struct HookDispatcher {
    service: IndexingService,
    cancel: CancellationToken,
}

impl HookDispatcher {
    #[must_use]
    pub fn new(service: IndexingService, cancel: CancellationToken) -> Self {
        Self { service, cancel }
    }

    /// Run `hook` in the background. `name` labels it in the log.
    ///
    /// ```no_run
    /// # use inventory_indexer::HookDispatcher;
    /// # fn demo(hooks: &HookDispatcher, unit_id: uuid::Uuid, property_id: uuid::Uuid) {
    /// hooks.spawn("unit_deleted", move |service, cancel| async move {
    ///     service.on_unit_deleted(unit_id, property_id, &cancel).await
    /// });
    /// # }
    /// ```
    pub fn spawn<F, Fut>(&self, name: &'static str, hook: F) -> JoinHandle<()>
    where
        F: FnOnce(IndexingService, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
    {
        let service = self.service.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            match hook(service.clone(), cancel).await {
                Ok(HookOutcome::Skipped) => {
                    debug!("Hook {name} skipped: target not indexed");
                }
                Ok(outcome) => {
                    debug!("Hook {name} finished: {outcome:?}");
                }
                Err(err) => {
                    service.record_hook_failure();
                    warn!("Hook {name} failed: {err}");
                }
            }
        })
    }
}
