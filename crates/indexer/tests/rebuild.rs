mod common;

use async_trait::async_trait;
use common::*;
use inventory_documents::{Decimal, ListingFilter, PriceSummary, SectionTarget, Uuid};
use inventory_indexer::{
    spawn_startup_rebuild, HookOutcome, IndexerConfig, IndexerError, IndexingService,
    InMemorySources, PropertyRecord, PropertySource, SeedData, SourceResult, Sources,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn rebuild_projects_sources_and_prunes_orphans() {
    let fx = fixture();
    let stats = fx
        .service
        .rebuild_index(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        (stats.properties, stats.units, stats.sections),
        (3, 4, 1)
    );
    assert_eq!(stats.orphans_pruned, 1);
    assert_eq!(stats.written, 8);

    let counts = fx.service.store().counts();
    assert_eq!((counts.properties, counts.units), (3, 4));
    assert_eq!(fx.service.get_unit(U3), None);

    let p1 = fx.service.get_property(P1).unwrap();
    assert_eq!(p1.unit_count, 2);
    assert_eq!(p1.max_capacity, 5);
    assert_eq!(
        p1.base_price,
        PriceSummary {
            base: Decimal::new(120, 0),
            min: Decimal::new(100, 0),
            max: Decimal::new(220, 0),
        }
    );

    let u1 = fx.service.get_unit(U1).unwrap();
    assert_eq!(u1.availability.as_slice(), &[range(1, 5)]);
    assert_eq!(u1.property_id, P1);
}

#[tokio::test]
async fn rebuild_deletes_what_the_sources_dropped() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    fx.service.rebuild_index(&cancel).await.unwrap();

    fx.sources.remove_property(P3);
    fx.sources.remove_unit(U2);
    let stats = fx.service.rebuild_index(&cancel).await.unwrap();

    assert_eq!(stats.deleted, 3);
    assert_eq!(stats.orphans_pruned, 2);
    assert_eq!(fx.service.get_property(P3), None);
    assert_eq!(fx.service.get_unit(U5), None);
    assert_eq!(fx.service.get_unit(U2), None);

    let counts = fx.service.store().counts();
    assert_eq!((counts.properties, counts.units), (2, 2));
    assert_eq!(fx.service.get_property(P1).unwrap().unit_count, 1);
}

#[tokio::test]
async fn repeated_rebuild_leaves_documents_untouched() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    fx.service.rebuild_index(&cancel).await.unwrap();
    let before = fx.service.get_property(P2).unwrap();

    let stats = fx.service.rebuild_index(&cancel).await.unwrap();
    assert_eq!(stats.written, 0);
    assert_eq!(stats.unchanged, 8);
    assert_eq!(fx.service.get_property(P2), Some(before));
}

#[tokio::test]
async fn source_failure_keeps_last_state() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    fx.service.rebuild_index(&cancel).await.unwrap();
    let counts = fx.service.store().counts();

    fx.sources.set_offline(true);
    let err = fx.service.rebuild_index(&cancel).await.unwrap_err();
    assert!(matches!(err, IndexerError::SourceUnavailable(_)));
    assert_eq!(fx.service.store().counts(), counts);

    let health = fx.service.health();
    assert_eq!(health.rebuild.consecutive_failures, 1);
    assert!(health.rebuild.last_error.as_ref().unwrap().contains("unavailable"));
    assert!(!health.rebuild.rebuilding);
    assert!(!health.is_healthy());

    fx.sources.set_offline(false);
    fx.service.rebuild_index(&cancel).await.unwrap();
    assert!(fx.service.health().is_healthy());
}

#[tokio::test]
async fn cancelled_rebuild_writes_nothing() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fx.service.rebuild_index(&cancel).await.unwrap_err();
    assert!(matches!(err, IndexerError::Cancelled));
    assert_eq!(fx.service.store().counts().properties, 0);
    assert!(!fx.service.is_rebuilding());
}

/// Property source that reads its records, then parks until released.
struct GatedProperties {
    inner: Arc<InMemorySources>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl PropertySource for GatedProperties {
    async fn list_properties(&self) -> SourceResult<Vec<PropertyRecord>> {
        let records = self.inner.list_properties().await;
        self.entered.notify_one();
        self.release.notified().await;
        records
    }
}

fn gated_service(dir: &TempDir) -> (IndexingService, Arc<Notify>, Arc<Notify>) {
    let memory = Arc::new(InMemorySources::new(inventory()));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let sources = Sources {
        properties: Arc::new(GatedProperties {
            inner: memory.clone(),
            entered: entered.clone(),
            release: release.clone(),
        }),
        units: memory.clone(),
        availability: memory.clone(),
        pricing: memory.clone(),
        sections: memory,
    };
    let service = IndexingService::open(config_for(dir.path()), sources).unwrap();
    (service, entered, release)
}

#[tokio::test]
async fn only_one_rebuild_runs_at_a_time() {
    let dir = TempDir::new().unwrap();
    let (service, entered, release) = gated_service(&dir);

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.rebuild_index(&CancellationToken::new()).await })
    };
    entered.notified().await;
    assert!(service.is_rebuilding());

    let second = service.rebuild_index(&CancellationToken::new()).await;
    assert!(matches!(second, Err(IndexerError::RebuildInProgress)));

    release.notify_one();
    let stats = first.await.unwrap().unwrap();
    assert_eq!(stats.documents(), 7);
    assert!(!service.is_rebuilding());
}

#[tokio::test]
async fn cancel_while_loading_sources() {
    let dir = TempDir::new().unwrap();
    let (service, entered, _release) = gated_service(&dir);
    let cancel = CancellationToken::new();

    let running = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.rebuild_index(&cancel).await })
    };
    entered.notified().await;
    cancel.cancel();

    assert!(matches!(
        running.await.unwrap(),
        Err(IndexerError::Cancelled)
    ));
    assert_eq!(service.store().counts().properties, 0);
    assert_eq!(
        service.health().rebuild.last_error.as_deref(),
        Some("Operation cancelled")
    );
}

#[tokio::test]
async fn later_write_in_queue_order_wins() {
    let dir = TempDir::new().unwrap();
    let (service, entered, release) = gated_service(&dir);
    let cancel = CancellationToken::new();

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.rebuild_index(&CancellationToken::new()).await })
    };
    entered.notified().await;
    release.notify_one();
    first.await.unwrap().unwrap();

    // The rebuild has read its snapshot; the hook lands before its writes.
    let rebuild = {
        let service = service.clone();
        tokio::spawn(async move { service.rebuild_index(&CancellationToken::new()).await })
    };
    entered.notified().await;
    let outcome = service
        .on_property_featured_changed(P2, true, &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, HookOutcome::Applied);
    assert!(service.get_property(P2).unwrap().is_featured);

    release.notify_one();
    let stats = rebuild.await.unwrap().unwrap();
    assert_eq!(stats.written, 1);
    assert!(!service.get_property(P2).unwrap().is_featured);

    let outcome = service
        .on_property_featured_changed(P2, true, &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, HookOutcome::Applied);
    assert!(service.get_property(P2).unwrap().is_featured);
}

fn large_inventory(properties: u128, units_per_property: u128) -> SeedData {
    let mut data = SeedData::default();
    for p in 0..properties {
        let property_id = Uuid::from_u128(0x10_000 + p);
        data.properties.push(property(property_id, &format!("Property {p}"), "Aden", false));
        for u in 0..units_per_property {
            let unit_id = Uuid::from_u128(0x20_000 + p * units_per_property + u);
            data.units.push(unit(unit_id, property_id, &format!("Unit {u}"), 2, 90));
        }
    }
    data
}

#[tokio::test]
async fn cancel_between_writes_leaves_a_consistent_index() {
    let dir = TempDir::new().unwrap();
    let sources = Arc::new(InMemorySources::new(large_inventory(150, 3)));
    let config = IndexerConfig {
        queue_capacity: 1,
        ..config_for(dir.path())
    };
    let service =
        IndexingService::open(config.clone(), Sources::from_shared(sources.clone())).unwrap();
    let cancel = CancellationToken::new();

    let running = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.rebuild_index(&cancel).await })
    };
    while service.store().counts().properties == 0 {
        tokio::task::yield_now().await;
    }
    cancel.cancel();

    assert!(matches!(
        running.await.unwrap(),
        Err(IndexerError::Cancelled)
    ));
    service.shutdown().await;

    let counts = service.store().counts();
    assert!(counts.properties + counts.units < 600);
    service.store().read(|c| {
        for unit in c.units() {
            assert!(
                c.property(&unit.property_id).is_some(),
                "unit {} indexed without its property",
                unit.id
            );
        }
    });

    let reopened = IndexingService::open(config, Sources::from_shared(sources)).unwrap();
    assert_eq!(reopened.store().counts(), counts);
    let stats = reopened
        .rebuild_index(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.documents(), 600);
    assert_eq!(reopened.store().counts().units, 450);
}

#[tokio::test]
async fn startup_rebuild_runs_in_background() {
    let fx = fixture();
    let health = fx.service.subscribe_health();
    let handle = spawn_startup_rebuild(fx.service.clone(), CancellationToken::new());

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.documents(), 7);
    assert!(health.has_changed().unwrap());
    assert_eq!(health.borrow().last_stats.as_ref(), Some(&stats));
}

#[tokio::test]
async fn startup_rebuild_failure_is_contained() {
    let fx = fixture();
    fx.sources.set_offline(true);

    let outcome = spawn_startup_rebuild(fx.service.clone(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, None);
    assert_eq!(fx.service.health().rebuild.consecutive_failures, 1);
}

#[tokio::test]
async fn sections_and_search_read_the_rebuilt_index() {
    let fx = fixture();
    fx.service
        .rebuild_index(&CancellationToken::new())
        .await
        .unwrap();

    let page = fx
        .service
        .list_by_section(FEATURED, &ListingFilter::default(), 0, 0);
    let ids: Vec<_> = page.items.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![P3, P1]);
    assert_eq!((page.page, page.page_size, page.total), (1, 20, 2));

    let aden = ListingFilter {
        city: Some("aden".to_string()),
        ..ListingFilter::default()
    };
    let page = fx.service.list_by_section(FEATURED, &aden, 1, 10);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id(), P1);

    let unknown = fx.service.list_by_section(
        Uuid::from_u128(0xdead),
        &ListingFilter::default(),
        1,
        10,
    );
    assert_eq!(unknown.total, 0);

    let properties = fx
        .service
        .search(SectionTarget::Properties, &ListingFilter::default(), 1, 2);
    let ids: Vec<_> = properties.items.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![P1, P3]);
    assert_eq!(properties.total, 3);
    assert!(properties.has_next());

    let roomy = ListingFilter {
        min_capacity: Some(4),
        ..ListingFilter::default()
    };
    let units = fx.service.search(SectionTarget::Units, &roomy, 1, 10);
    let mut ids: Vec<_> = units.items.iter().map(|d| d.id()).collect();
    ids.sort();
    assert_eq!(ids, vec![U2, U5]);
}

#[tokio::test]
async fn property_stay_filter_checks_unit_dates() {
    let fx = fixture();
    fx.service
        .rebuild_index(&CancellationToken::new())
        .await
        .unwrap();

    let stay = |start, end| ListingFilter {
        stay: Some(range(start, end)),
        ..ListingFilter::default()
    };

    let page = fx.service.search(SectionTarget::Properties, &stay(3, 5), 1, 10);
    let ids: Vec<_> = page.items.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![P1, P2]);

    let page = fx.service.search(SectionTarget::Properties, &stay(20, 22), 1, 10);
    assert_eq!(page.total, 0);

    let page = fx.service.list_by_section(FEATURED, &stay(3, 5), 1, 10);
    let ids: Vec<_> = page.items.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![P1]);
    assert_eq!(fx.service.list_by_section(FEATURED, &stay(6, 8), 1, 10).total, 0);
}

#[tokio::test]
async fn index_survives_restart() {
    let fx = fixture();
    fx.service
        .rebuild_index(&CancellationToken::new())
        .await
        .unwrap();
    let p1 = fx.service.get_property(P1).unwrap();
    fx.service.shutdown().await;

    let reopened = IndexingService::open(
        config_for(fx.dir.path()),
        Sources::from_shared(fx.sources.clone()),
    )
    .unwrap();
    assert_eq!(reopened.get_property(P1), Some(p1));
    assert_eq!(reopened.store().counts().units, 4);
}
