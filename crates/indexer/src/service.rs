use crate::cache::{CacheKey, IndexCache};
use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::health::{HealthTracker, IndexerHealth, RebuildHealth};
use crate::projection::{
    price_summary, project_property, project_section, project_unit, same_content,
};
use crate::source::{
    PricingRule, PropertyRecord, SectionRecord, SourceSnapshot, Sources, UnitRecord,
};
use crate::stats::RebuildStats;
use chrono::Utc;
use inventory_documents::{
    AvailabilityRanges, DateRange, IndexedDocument, ListingFilter, Page, PriceSummary,
    PropertyDocument, SectionDocument, SectionTarget, UnitDocument,
};
use inventory_store::{
    Collections, IndexStore, ShutdownOutcome, StoreWriter, WriteHandle, WriteQueue,
};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type StoreResult<T> = inventory_store::Result<T>;

/// What an incremental hook did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOutcome {
    Applied,
    /// The target is indexed but already in the requested state.
    Unchanged,
    /// The target is not indexed (orphan reference); nothing was written.
    Skipped,
}

/// Keeps the inventory index in step with the systems of record and
/// answers listing queries from it.
///
/// All writes go through the write queue; reads go straight to the store
/// (or the cache) and never wait behind writes.
#[derive(Clone)]
pub struct IndexingService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: IndexStore,
    queue: WriteQueue,
    sources: Sources,
    cache: Arc<IndexCache>,
    config: IndexerConfig,
    rebuilding: AtomicBool,
    health: HealthTracker,
}

/// Clears the single-rebuild flag however the rebuild ends.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IndexingService {
    /// Open the store at `config.store_path` and start its write queue.
    pub fn open(config: IndexerConfig, sources: Sources) -> Result<Self> {
        config.validate()?;
        let (store, writer) = IndexStore::open(&config.store_path, config.store_options())?;
        let queue = WriteQueue::start(writer, config.queue_config())?;
        let cache = Arc::new(IndexCache::new(config.cache_capacity, config.cache_ttl()));

        info!(
            "Indexing service ready (store {}, queue capacity {})",
            config.store_path.display(),
            config.queue_capacity
        );
        Ok(Self {
            inner: Arc::new(ServiceInner {
                store,
                queue,
                sources,
                cache,
                config,
                rebuilding: AtomicBool::new(false),
                health: HealthTracker::new(),
            }),
        })
    }

    #[must_use]
    pub fn store(&self) -> &IndexStore {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_rebuilding(&self) -> bool {
        self.inner.rebuilding.load(Ordering::Acquire)
    }

    // ── Rebuild ─────────────────────────────────────────────────────────

    /// Make the index match the sources as read at the start of the call.
    ///
    /// Every projected document is upserted and every indexed document
    /// without a source entity is deleted, one write-queue unit per entity.
    /// On a source failure nothing is written and the index keeps its last
    /// state.
    pub async fn rebuild_index(&self, cancel: &CancellationToken) -> Result<RebuildStats> {
        if self
            .inner
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IndexerError::RebuildInProgress);
        }
        let _guard = RebuildGuard(&self.inner.rebuilding);

        let started = Instant::now();
        self.inner.health.rebuild_started();
        info!("Rebuilding inventory index");

        let result = self.rebuild_inner(cancel, started).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(stats) => {
                self.inner.health.rebuild_succeeded(stats);
                info!(
                    "Rebuild finished in {elapsed_ms}ms: {} properties, {} units, {} sections ({} written, {} unchanged, {} deleted, {} orphans pruned)",
                    stats.properties,
                    stats.units,
                    stats.sections,
                    stats.written,
                    stats.unchanged,
                    stats.deleted,
                    stats.orphans_pruned
                );
            }
            Err(IndexerError::Cancelled) => {
                warn!("Rebuild cancelled after {elapsed_ms}ms");
                self.inner
                    .health
                    .rebuild_failed(IndexerError::Cancelled.to_string(), elapsed_ms);
            }
            Err(err) => {
                error!("Rebuild failed after {elapsed_ms}ms: {err}");
                self.inner.health.rebuild_failed(err.to_string(), elapsed_ms);
            }
        }
        result
    }

    async fn rebuild_inner(
        &self,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RebuildStats> {
        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(IndexerError::Cancelled),
            loaded = self.inner.sources.load_snapshot() => loaded?,
        };
        let plan = RebuildPlan::project(snapshot);

        let mut stats = RebuildStats::new();
        stats.properties = plan.properties.len();
        stats.units = plan.units.len();
        stats.sections = plan.sections.len();
        stats.orphans_pruned = plan.orphans;

        let (stale_units, stale_properties, stale_sections) =
            self.inner.store.read(|c| plan.stale(c));

        let mut puts: Vec<WriteHandle<bool>> = Vec::new();
        for doc in plan.properties {
            let cache = self.inner.cache.clone();
            puts.push(
                self.submit(cancel, move |w| put_property(w, &cache, doc))
                    .await?,
            );
        }
        for doc in plan.units {
            let cache = self.inner.cache.clone();
            puts.push(self.submit(cancel, move |w| put_unit(w, &cache, doc)).await?);
        }
        for doc in plan.sections {
            let cache = self.inner.cache.clone();
            puts.push(
                self.submit(cancel, move |w| put_section(w, &cache, doc))
                    .await?,
            );
        }

        let mut deletes: Vec<WriteHandle<bool>> = Vec::new();
        for id in stale_units {
            let cache = self.inner.cache.clone();
            deletes.push(
                self.submit(cancel, move |w| Ok(delete_unit(w, &cache, id)?.is_some()))
                    .await?,
            );
        }
        for id in stale_properties {
            let cache = self.inner.cache.clone();
            deletes.push(
                self.submit(cancel, move |w| {
                    Ok(delete_property(w, &cache, id)?.is_some())
                })
                .await?,
            );
        }
        for id in stale_sections {
            let cache = self.inner.cache.clone();
            deletes.push(
                self.submit(cancel, move |w| Ok(delete_section(w, &cache, id)?.is_some()))
                    .await?,
            );
        }

        for handle in puts {
            if handle.await? {
                stats.written += 1;
            } else {
                stats.unchanged += 1;
            }
        }
        for handle in deletes {
            if handle.await? {
                stats.deleted += 1;
            }
        }

        self.inner.queue.execute(StoreWriter::compact).await?;
        self.inner.cache.clear();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    }

    // ── Incremental hooks ───────────────────────────────────────────────

    /// Remove a deleted unit and refresh its property's aggregates.
    pub async fn on_unit_deleted(
        &self,
        unit_id: Uuid,
        property_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let Some(removed) = delete_unit(w, &cache, unit_id)? else {
                return Ok(HookOutcome::Skipped);
            };
            if removed.property_id != property_id {
                debug!(
                    "Unit {unit_id} was indexed under property {} not {property_id}",
                    removed.property_id
                );
            }
            refresh_aggregates(w, &cache, removed.property_id)?;
            Ok(HookOutcome::Applied)
        })
        .await
    }

    /// Replace a unit's availability with exactly `ranges`.
    pub async fn on_availability_changed(
        &self,
        unit_id: Uuid,
        property_id: Uuid,
        ranges: Vec<DateRange>,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let Some(mut unit) = w.unit(unit_id) else {
                debug!(
                    "Availability change for unindexed unit {unit_id} (property {property_id})"
                );
                return Ok(HookOutcome::Skipped);
            };
            let availability = AvailabilityRanges::normalize(ranges);
            if unit.availability == availability {
                return Ok(HookOutcome::Unchanged);
            }
            unit.availability = availability;
            put_unit(w, &cache, unit)?;
            Ok(HookOutcome::Applied)
        })
        .await
    }

    /// Set (`is_add`) or remove one dynamic field of a property.
    pub async fn on_dynamic_field_changed(
        &self,
        property_id: Uuid,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        is_add: bool,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let (name, value) = (field_name.into(), field_value.into());
        self.patch_property(cancel, property_id, move |p| {
            if is_add {
                p.dynamic_fields.insert(name, value.clone()) != Some(value)
            } else {
                p.dynamic_fields.remove(&name).is_some()
            }
        })
        .await
    }

    pub async fn on_property_price_changed(
        &self,
        property_id: Uuid,
        base_price: Decimal,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let Some(current) = w.property(property_id) else {
                return Ok(HookOutcome::Skipped);
            };
            let units = w.units_of_property(property_id);
            let mut property = current.clone();
            property.base_price = PriceSummary::flat(base_price);
            property.apply_unit_aggregates(&units);
            if same_content(&current, &property, |d| d.version = 0) {
                return Ok(HookOutcome::Unchanged);
            }
            property.updated_at = Utc::now();
            Ok(outcome(put_property(w, &cache, property)?))
        })
        .await
    }

    pub async fn on_property_images_changed(
        &self,
        property_id: Uuid,
        main_image_url: Option<String>,
        image_urls: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        self.patch_property(cancel, property_id, move |p| {
            let changed = p.main_image_url != main_image_url || p.image_urls != image_urls;
            p.main_image_url = main_image_url;
            p.image_urls = image_urls;
            changed
        })
        .await
    }

    pub async fn on_property_featured_changed(
        &self,
        property_id: Uuid,
        is_featured: bool,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        self.patch_property(cancel, property_id, move |p| {
            let changed = p.is_featured != is_featured;
            p.is_featured = is_featured;
            changed
        })
        .await
    }

    /// Re-project a created or edited property over its indexed units.
    pub async fn on_property_upserted(
        &self,
        record: PropertyRecord,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let units = w.units_of_property(record.id);
            let doc = project_property(&record, &units);
            Ok(outcome(put_property(w, &cache, doc)?))
        })
        .await
    }

    /// Remove a property and every unit indexed under it.
    pub async fn on_property_deleted(
        &self,
        property_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let mut removed_any = false;
            for unit in w.units_of_property(property_id) {
                removed_any |= delete_unit(w, &cache, unit.id)?.is_some();
            }
            removed_any |= delete_property(w, &cache, property_id)?.is_some();
            Ok(if removed_any {
                HookOutcome::Applied
            } else {
                HookOutcome::Skipped
            })
        })
        .await
    }

    /// Re-project a created or edited unit, reading its availability and
    /// pricing from the sources.
    pub async fn on_unit_upserted(
        &self,
        record: UnitRecord,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let sources = &self.inner.sources;
        let (windows, rules) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(IndexerError::Cancelled),
            loaded = async {
                tokio::try_join!(
                    sources.availability.availability_of(record.id),
                    sources.pricing.pricing_rules_of(record.id),
                )
            } => loaded?,
        };

        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            if w.property(record.property_id).is_none() {
                debug!(
                    "Skipping unit {}: property {} is not indexed",
                    record.id, record.property_id
                );
                return Ok(HookOutcome::Skipped);
            }
            let previous_owner = w.unit(record.id).map(|u| u.property_id);
            let doc = project_unit(&record, windows, &rules);
            let written = put_unit(w, &cache, doc)?;
            if written {
                if let Some(old) = previous_owner.filter(|old| *old != record.property_id) {
                    refresh_aggregates(w, &cache, old)?;
                }
                refresh_aggregates(w, &cache, record.property_id)?;
            }
            Ok(outcome(written))
        })
        .await
    }

    /// Recompute a unit's price envelope from its base price and `rules`.
    pub async fn on_unit_pricing_changed(
        &self,
        unit_id: Uuid,
        rules: Vec<PricingRule>,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let Some(mut unit) = w.unit(unit_id) else {
                return Ok(HookOutcome::Skipped);
            };
            let rules: Vec<PricingRule> = rules
                .into_iter()
                .filter(|r| r.unit_id == unit_id)
                .collect();
            unit.pricing = price_summary(unit.pricing.base, &rules);
            let property_id = unit.property_id;
            let written = put_unit(w, &cache, unit)?;
            if written {
                refresh_aggregates(w, &cache, property_id)?;
            }
            Ok(outcome(written))
        })
        .await
    }

    pub async fn on_section_upserted(
        &self,
        record: SectionRecord,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        let doc = project_section(&record);
        self.run_unit(cancel, move |w| Ok(outcome(put_section(w, &cache, doc)?)))
            .await
    }

    pub async fn on_section_deleted(
        &self,
        section_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<HookOutcome> {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            Ok(match delete_section(w, &cache, section_id)? {
                Some(_) => HookOutcome::Applied,
                None => HookOutcome::Skipped,
            })
        })
        .await
    }

    /// Read-modify-write of one property inside a single unit of work.
    /// `patch` returns whether it changed anything.
    async fn patch_property<P>(
        &self,
        cancel: &CancellationToken,
        property_id: Uuid,
        patch: P,
    ) -> Result<HookOutcome>
    where
        P: FnOnce(&mut PropertyDocument) -> bool + Send + 'static,
    {
        let cache = self.inner.cache.clone();
        self.run_unit(cancel, move |w| {
            let Some(mut property) = w.property(property_id) else {
                debug!("Skipping change for unindexed property {property_id}");
                return Ok(HookOutcome::Skipped);
            };
            if !patch(&mut property) {
                return Ok(HookOutcome::Unchanged);
            }
            property.updated_at = Utc::now();
            put_property(w, &cache, property)?;
            Ok(HookOutcome::Applied)
        })
        .await
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Property or unit document with this id.
    #[must_use]
    pub fn get_by_id(&self, id: Uuid) -> Option<IndexedDocument> {
        let store = &self.inner.store;
        let version = store.read(|c| {
            c.property(&id)
                .map(|d| d.version)
                .or_else(|| c.unit(&id).map(|d| d.version))
        })?;
        self.inner
            .cache
            .document(id, version, || store.document(id))
    }

    #[must_use]
    pub fn get_property(&self, id: Uuid) -> Option<PropertyDocument> {
        self.get_by_id(id).and_then(IndexedDocument::into_property)
    }

    #[must_use]
    pub fn get_unit(&self, id: Uuid) -> Option<UnitDocument> {
        self.get_by_id(id).and_then(IndexedDocument::into_unit)
    }

    #[must_use]
    pub fn get_section(&self, id: Uuid) -> Option<SectionDocument> {
        self.inner.store.section(id)
    }

    /// The section's items, in section order, that pass `filter`.
    ///
    /// An unknown section yields an empty page.
    #[must_use]
    pub fn list_by_section(
        &self,
        section_id: Uuid,
        filter: &ListingFilter,
        page: usize,
        page_size: usize,
    ) -> Page<IndexedDocument> {
        let (page, page_size) = self.inner.config.normalize_page(page, page_size);
        let key = CacheKey::Section {
            section_id,
            filter: filter.clone(),
            page,
            page_size,
        };
        self.inner.cache.listing(key, || {
            self.inner
                .store
                .read(|c| section_page(c, section_id, filter, page, page_size))
        })
    }

    /// Every document of `target` that passes `filter`.
    ///
    /// Properties come featured first, then by name; units are grouped by
    /// property, then by name.
    #[must_use]
    pub fn search(
        &self,
        target: SectionTarget,
        filter: &ListingFilter,
        page: usize,
        page_size: usize,
    ) -> Page<IndexedDocument> {
        let (page, page_size) = self.inner.config.normalize_page(page, page_size);
        let key = CacheKey::Search {
            target,
            filter: filter.clone(),
            page,
            page_size,
        };
        self.inner.cache.listing(key, || {
            self.inner
                .store
                .read(|c| search_page(c, target, filter, page, page_size))
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    #[must_use]
    pub fn health(&self) -> IndexerHealth {
        IndexerHealth {
            rebuild: self.inner.health.snapshot(),
            queue: self.inner.queue.stats(),
            store: self.inner.store.counts(),
            cache: self.inner.cache.stats(),
        }
    }

    #[must_use]
    pub fn subscribe_health(&self) -> watch::Receiver<RebuildHealth> {
        self.inner.health.subscribe()
    }

    pub(crate) fn record_hook_failure(&self) {
        self.inner.health.hook_failed();
    }

    /// Drain the write queue and stop it. Later writes fail with
    /// `ShuttingDown`; reads keep working.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let outcome = self.inner.queue.shutdown().await;
        info!("Indexing service stopped ({outcome:?})");
        outcome
    }

    // ── Write queue plumbing ────────────────────────────────────────────

    /// Enqueue `work` unless `cancel` fires first.
    async fn submit<F, T>(&self, cancel: &CancellationToken, work: F) -> Result<WriteHandle<T>>
    where
        F: FnOnce(&mut StoreWriter) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(IndexerError::Cancelled),
            handle = self.inner.queue.submit(work) => Ok(handle?),
        }
    }

    /// Enqueue `work` and wait for its result. Once queued, the unit runs
    /// even if `cancel` fires.
    async fn run_unit<F, T>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        F: FnOnce(&mut StoreWriter) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.submit(cancel, work).await?;
        Ok(handle.await?)
    }
}

fn outcome(written: bool) -> HookOutcome {
    if written {
        HookOutcome::Applied
    } else {
        HookOutcome::Unchanged
    }
}

// ── Units of work ───────────────────────────────────────────────────────
//
// These run on the writer thread. Each invalidates the cache before the
// unit's result is reported, so a caller that saw its write complete never
// reads the old state back from the cache.

fn put_property(
    w: &mut StoreWriter,
    cache: &IndexCache,
    doc: PropertyDocument,
) -> StoreResult<bool> {
    let before = w.property(doc.id);
    if before
        .as_ref()
        .is_some_and(|current| same_content(current, &doc, |d| d.version = 0))
    {
        return Ok(false);
    }
    let after = w.put_property(doc)?;
    cache.record_change(
        before.map(IndexedDocument::from).as_ref(),
        Some(&IndexedDocument::from(after)),
    );
    Ok(true)
}

fn put_unit(w: &mut StoreWriter, cache: &IndexCache, doc: UnitDocument) -> StoreResult<bool> {
    let before = w.unit(doc.id);
    if before
        .as_ref()
        .is_some_and(|current| same_content(current, &doc, |d| d.version = 0))
    {
        return Ok(false);
    }
    let after = w.put_unit(doc)?;
    cache.record_change(
        before.map(IndexedDocument::from).as_ref(),
        Some(&IndexedDocument::from(after)),
    );
    Ok(true)
}

fn put_section(
    w: &mut StoreWriter,
    cache: &IndexCache,
    doc: SectionDocument,
) -> StoreResult<bool> {
    if w
        .section(doc.id)
        .is_some_and(|current| same_content(&current, &doc, |d| d.version = 0))
    {
        return Ok(false);
    }
    let after = w.put_section(doc)?;
    cache.invalidate_section(after.id);
    Ok(true)
}

fn delete_unit(
    w: &mut StoreWriter,
    cache: &IndexCache,
    id: Uuid,
) -> StoreResult<Option<UnitDocument>> {
    let removed = w.delete_unit(id)?;
    if let Some(doc) = &removed {
        cache.record_change(Some(&IndexedDocument::from(doc.clone())), None);
    }
    Ok(removed)
}

fn delete_property(
    w: &mut StoreWriter,
    cache: &IndexCache,
    id: Uuid,
) -> StoreResult<Option<PropertyDocument>> {
    let removed = w.delete_property(id)?;
    if let Some(doc) = &removed {
        cache.record_change(Some(&IndexedDocument::from(doc.clone())), None);
    }
    Ok(removed)
}

fn delete_section(
    w: &mut StoreWriter,
    cache: &IndexCache,
    id: Uuid,
) -> StoreResult<Option<SectionDocument>> {
    let removed = w.delete_section(id)?;
    if removed.is_some() {
        cache.invalidate_section(id);
    }
    Ok(removed)
}

/// Recompute the unit-derived fields of `property_id`, writing only when
/// they changed.
fn refresh_aggregates(
    w: &mut StoreWriter,
    cache: &IndexCache,
    property_id: Uuid,
) -> StoreResult<bool> {
    let Some(mut property) = w.property(property_id) else {
        return Ok(false);
    };
    let units = w.units_of_property(property_id);
    if !property.apply_unit_aggregates(&units) {
        return Ok(false);
    }
    property.updated_at = Utc::now();
    put_property(w, cache, property)
}

// ── Rebuild planning ────────────────────────────────────────────────────

struct RebuildPlan {
    properties: Vec<PropertyDocument>,
    units: Vec<UnitDocument>,
    sections: Vec<SectionDocument>,
    orphans: usize,
}

impl RebuildPlan {
    fn project(snapshot: SourceSnapshot) -> Self {
        let SourceSnapshot {
            properties,
            units,
            availability,
            pricing,
            sections,
        } = snapshot;

        let mut windows: HashMap<Uuid, Vec<DateRange>> = HashMap::new();
        for record in availability {
            windows.entry(record.unit_id).or_default().push(record.window);
        }
        let mut rules: HashMap<Uuid, Vec<PricingRule>> = HashMap::new();
        for rule in pricing {
            rules.entry(rule.unit_id).or_default().push(rule);
        }

        let property_ids: HashSet<Uuid> = properties.iter().map(|p| p.id).collect();
        let mut orphans = 0;
        let mut by_property: HashMap<Uuid, Vec<UnitDocument>> = HashMap::new();
        let mut unit_docs = Vec::with_capacity(units.len());
        for record in &units {
            if !property_ids.contains(&record.property_id) {
                debug!(
                    "Pruning orphan unit {} (property {} missing)",
                    record.id, record.property_id
                );
                orphans += 1;
                continue;
            }
            let doc = project_unit(
                record,
                windows.remove(&record.id).unwrap_or_default(),
                rules.get(&record.id).map(Vec::as_slice).unwrap_or_default(),
            );
            by_property
                .entry(doc.property_id)
                .or_default()
                .push(doc.clone());
            unit_docs.push(doc);
        }

        let property_docs = properties
            .iter()
            .map(|record| {
                let units = by_property
                    .get(&record.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                project_property(record, units)
            })
            .collect();

        Self {
            properties: property_docs,
            units: unit_docs,
            sections: sections.iter().map(project_section).collect(),
            orphans,
        }
    }

    /// Indexed ids with no counterpart in this plan: (units, properties,
    /// sections).
    fn stale(&self, collections: &Collections) -> (Vec<Uuid>, Vec<Uuid>, Vec<Uuid>) {
        let keep_units: HashSet<Uuid> = self.units.iter().map(|d| d.id).collect();
        let keep_properties: HashSet<Uuid> = self.properties.iter().map(|d| d.id).collect();
        let keep_sections: HashSet<Uuid> = self.sections.iter().map(|d| d.id).collect();

        let units = collections
            .units()
            .map(|d| d.id)
            .filter(|id| !keep_units.contains(id))
            .collect();
        let properties = collections
            .properties()
            .map(|d| d.id)
            .filter(|id| !keep_properties.contains(id))
            .collect();
        let sections = collections
            .sections()
            .map(|d| d.id)
            .filter(|id| !keep_sections.contains(id))
            .collect();
        (units, properties, sections)
    }
}

// ── Listing reads ───────────────────────────────────────────────────────

/// A property passes a stay only if one of its bookable units covers it.
fn property_matches(c: &Collections, filter: &ListingFilter, doc: &PropertyDocument) -> bool {
    if !filter.matches_property(doc) {
        return false;
    }
    filter.stay.as_ref().map_or(true, |stay| {
        c.units_of_property(&doc.id)
            .any(|u| u.is_available && u.availability.covers(stay))
    })
}

fn section_page(
    c: &Collections,
    section_id: Uuid,
    filter: &ListingFilter,
    page: usize,
    page_size: usize,
) -> Page<IndexedDocument> {
    let Some(section) = c.section(&section_id) else {
        return Page::empty(page, page_size);
    };
    match section.target {
        SectionTarget::Properties => {
            let matching: Vec<&PropertyDocument> = section
                .items
                .iter()
                .filter_map(|id| c.property(id))
                .filter(|doc| property_matches(c, filter, doc))
                .collect();
            Page::slice(matching, page, page_size)
                .map(|doc| IndexedDocument::Property(doc.clone()))
        }
        SectionTarget::Units => {
            let matching: Vec<&UnitDocument> = section
                .items
                .iter()
                .filter_map(|id| c.unit(id))
                .filter(|doc| filter.matches_unit(doc))
                .collect();
            Page::slice(matching, page, page_size).map(|doc| IndexedDocument::Unit(doc.clone()))
        }
    }
}

fn search_page(
    c: &Collections,
    target: SectionTarget,
    filter: &ListingFilter,
    page: usize,
    page_size: usize,
) -> Page<IndexedDocument> {
    match target {
        SectionTarget::Properties => {
            let mut matching: Vec<&PropertyDocument> = c
                .properties()
                .filter(|doc| property_matches(c, filter, doc))
                .collect();
            matching.sort_by(|a, b| {
                b.is_featured
                    .cmp(&a.is_featured)
                    .then_with(|| a.name.cmp(&b.name))
                    .then_with(|| a.id.cmp(&b.id))
            });
            Page::slice(matching, page, page_size)
                .map(|doc| IndexedDocument::Property(doc.clone()))
        }
        SectionTarget::Units => {
            let mut matching: Vec<&UnitDocument> =
                c.units().filter(|doc| filter.matches_unit(doc)).collect();
            matching.sort_by(|a, b| {
                a.property_id
                    .cmp(&b.property_id)
                    .then_with(|| a.name.cmp(&b.name))
                    .then_with(|| a.id.cmp(&b.id))
            });
            Page::slice(matching, page, page_size).map(|doc| IndexedDocument::Unit(doc.clone()))
        }
    }
}
