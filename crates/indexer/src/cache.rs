use inventory_documents::{IndexedDocument, ListingFilter, Page, SectionTarget};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Document(Uuid),
    Section {
        section_id: Uuid,
        filter: ListingFilter,
        page: usize,
        page_size: usize,
    },
    Search {
        target: SectionTarget,
        filter: ListingFilter,
        page: usize,
        page_size: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

struct Entry<V> {
    value: V,
    version: Option<u64>,
    inserted_at: Instant,
}

/// Bounded LRU read cache with a TTL.
///
/// Every invalidation bumps an epoch; a value loaded while the epoch moved
/// is returned to its caller but not cached, so a load racing a write can
/// never park a stale value.
pub struct ReadCache<V> {
    entries: Mutex<LruCache<CacheKey, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
    epoch: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ReadCache<V> {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            capacity: capacity.get(),
            epoch: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, or the result of `load`.
    ///
    /// `current_version` is the version the store holds right now; an entry
    /// recorded with a different version is treated as a miss. `load`
    /// returns the value together with the version to record.
    pub fn get_or_load<F>(&self, key: CacheKey, current_version: Option<u64>, load: F) -> V
    where
        F: FnOnce() -> (V, Option<u64>),
    {
        {
            let mut entries = self.lock();
            let cached = entries.get(&key).map(|entry| {
                (entry.version == current_version && entry.inserted_at.elapsed() < self.ttl)
                    .then(|| entry.value.clone())
            });
            match cached {
                Some(Some(value)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return value;
                }
                Some(None) => {
                    entries.pop(&key);
                }
                None => {}
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let epoch = self.epoch.load(Ordering::Acquire);
        let (value, version) = load();

        let mut entries = self.lock();
        if self.epoch.load(Ordering::Acquire) == epoch {
            entries.put(
                key,
                Entry {
                    value: value.clone(),
                    version,
                    inserted_at: Instant::now(),
                },
            );
        }
        value
    }

    pub fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.lock();
        self.bump_epoch();
        entries.pop(key);
    }

    /// Drop every entry whose key matches `predicate`.
    pub fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let mut entries = self.lock();
        self.bump_epoch();
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        self.bump_epoch();
        entries.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
            capacity: self.capacity,
        }
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The service's cache: single documents plus listing pages.
pub struct IndexCache {
    documents: ReadCache<Option<IndexedDocument>>,
    listings: ReadCache<Page<IndexedDocument>>,
}

impl IndexCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            documents: ReadCache::new(capacity, ttl),
            listings: ReadCache::new(capacity, ttl),
        }
    }

    /// Document `id` at store version `version`.
    pub fn document<F>(&self, id: Uuid, version: u64, load: F) -> Option<IndexedDocument>
    where
        F: FnOnce() -> Option<IndexedDocument>,
    {
        self.documents
            .get_or_load(CacheKey::Document(id), Some(version), || {
                let doc = load();
                let loaded_version = doc.as_ref().map(IndexedDocument::version);
                (doc, loaded_version)
            })
    }

    pub fn listing<F>(&self, key: CacheKey, load: F) -> Page<IndexedDocument>
    where
        F: FnOnce() -> Page<IndexedDocument>,
    {
        self.listings.get_or_load(key, None, || (load(), None))
    }

    /// Forget everything a write from `before` to `after` can affect: the
    /// document itself and every listing whose filter admits either state.
    pub fn record_change(&self, before: Option<&IndexedDocument>, after: Option<&IndexedDocument>) {
        let Some(id) = before.or(after).map(IndexedDocument::id) else {
            return;
        };
        self.documents.invalidate(&CacheKey::Document(id));

        // A unit's dates decide which properties pass a stay filter.
        let unit_change = matches!(before.or(after), Some(IndexedDocument::Unit(_)));
        let admits = |filter: &ListingFilter, target: Option<SectionTarget>| {
            if unit_change && filter.stay.is_some() && target != Some(SectionTarget::Units) {
                return true;
            }
            [before, after].into_iter().flatten().any(|doc| {
                target.map_or(true, |t| doc.target() == t) && filter.matches(doc)
            })
        };
        self.listings.invalidate_where(|key| match key {
            CacheKey::Document(_) => false,
            CacheKey::Section { filter, .. } => admits(filter, None),
            CacheKey::Search { target, filter, .. } => admits(filter, Some(*target)),
        });
    }

    pub fn invalidate_section(&self, section_id: Uuid) {
        self.listings.invalidate_where(
            |key| matches!(key, CacheKey::Section { section_id: id, .. } if *id == section_id),
        );
    }

    pub fn clear(&self) {
        self.documents.clear();
        self.listings.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let documents = self.documents.stats();
        let listings = self.listings.stats();
        CacheStats {
            hits: documents.hits + listings.hits,
            misses: documents.misses + listings.misses,
            entries: documents.entries + listings.entries,
            capacity: documents.capacity + listings.capacity,
        }
    }
}
