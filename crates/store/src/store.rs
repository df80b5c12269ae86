use crate::collections::Collections;
use crate::error::{Result, StoreError};
use crate::journal::Journal;
use crate::ops::WriteOp;
use crate::snapshot::{read_snapshot, write_snapshot};
use inventory_documents::{
    DocumentKey, IndexedDocument, PropertyDocument, SectionDocument, UnitDocument, Uuid,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const SNAPSHOT_FILE_NAME: &str = "snapshot.json";
const JOURNAL_FILE_NAME: &str = "journal.jsonl";

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Fold the journal into a fresh snapshot once it holds this many
    /// entries. `0` disables automatic compaction.
    pub compact_after: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compact_after: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub properties: usize,
    pub units: usize,
    pub sections: usize,
    pub last_version: u64,
}

/// Read handle on the index store.
///
/// Cheap to clone. Reads take the store's shared lock and never wait on
/// disk I/O; writes only happen through the single [`StoreWriter`].
#[derive(Clone)]
pub struct IndexStore {
    shared: Arc<Shared>,
}

struct Shared {
    dir: PathBuf,
    collections: RwLock<Collections>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl IndexStore {
    /// Open the store directory, replaying the journal over the last
    /// snapshot. Returns the read handle and the one write handle.
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<(Self, StoreWriter)> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(StoreError::InvalidPath(format!(
                "Store path is not a directory: {}",
                dir.display()
            )));
        }
        std::fs::create_dir_all(&dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE_NAME);
        let mut collections = match read_snapshot(&snapshot_path)? {
            Some(snapshot) => snapshot.into_collections()?,
            None => Collections::default(),
        };

        let (journal, ops) = Journal::open(&dir.join(JOURNAL_FILE_NAME))?;
        let replayed = ops.len();
        for op in ops {
            collections.apply(op);
        }

        info!(
            "Opened index store at {} ({} properties, {} units, {} sections, {replayed} journal entries replayed)",
            dir.display(),
            collections.property_count(),
            collections.unit_count(),
            collections.section_count(),
        );

        let shared = Arc::new(Shared {
            dir,
            collections: RwLock::new(collections),
        });
        let writer = StoreWriter {
            shared: shared.clone(),
            journal,
            snapshot_path,
            compact_after: options.compact_after,
        };
        Ok((Self { shared }, writer))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Run `f` against a consistent view of every collection.
    pub fn read<R>(&self, f: impl FnOnce(&Collections) -> R) -> R {
        let guard = self.shared.read();
        f(&*guard)
    }

    #[must_use]
    pub fn property(&self, id: Uuid) -> Option<PropertyDocument> {
        self.shared.read().property(&id).cloned()
    }

    #[must_use]
    pub fn unit(&self, id: Uuid) -> Option<UnitDocument> {
        self.shared.read().unit(&id).cloned()
    }

    #[must_use]
    pub fn section(&self, id: Uuid) -> Option<SectionDocument> {
        self.shared.read().section(&id).cloned()
    }

    #[must_use]
    pub fn document(&self, id: Uuid) -> Option<IndexedDocument> {
        self.shared.read().document(&id)
    }

    #[must_use]
    pub fn units_of_property(&self, property_id: Uuid) -> Vec<UnitDocument> {
        self.shared
            .read()
            .units_of_property(&property_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn version_of(&self, key: DocumentKey) -> Option<u64> {
        self.shared.read().version_of(key)
    }

    #[must_use]
    pub fn counts(&self) -> StoreCounts {
        let guard = self.shared.read();
        StoreCounts {
            properties: guard.property_count(),
            units: guard.unit_count(),
            sections: guard.section_count(),
            last_version: guard.last_version(),
        }
    }
}

/// Exclusive write handle. Exactly one exists per opened store and it is
/// owned by the write queue worker.
pub struct StoreWriter {
    shared: Arc<Shared>,
    journal: Journal,
    snapshot_path: PathBuf,
    compact_after: usize,
}

impl StoreWriter {
    /// Read handle sharing this writer's collections.
    #[must_use]
    pub fn reader(&self) -> IndexStore {
        IndexStore {
            shared: self.shared.clone(),
        }
    }

    #[must_use]
    pub fn property(&self, id: Uuid) -> Option<PropertyDocument> {
        self.shared.read().property(&id).cloned()
    }

    #[must_use]
    pub fn unit(&self, id: Uuid) -> Option<UnitDocument> {
        self.shared.read().unit(&id).cloned()
    }

    #[must_use]
    pub fn section(&self, id: Uuid) -> Option<SectionDocument> {
        self.shared.read().section(&id).cloned()
    }

    #[must_use]
    pub fn units_of_property(&self, property_id: Uuid) -> Vec<UnitDocument> {
        self.shared
            .read()
            .units_of_property(&property_id)
            .cloned()
            .collect()
    }

    /// Insert or replace a property document. Returns it with its new version.
    pub fn put_property(&mut self, mut doc: PropertyDocument) -> Result<PropertyDocument> {
        doc.version = self.next_version();
        self.commit(WriteOp::PutProperty { doc: doc.clone() })?;
        Ok(doc)
    }

    pub fn put_unit(&mut self, mut doc: UnitDocument) -> Result<UnitDocument> {
        doc.version = self.next_version();
        self.commit(WriteOp::PutUnit { doc: doc.clone() })?;
        Ok(doc)
    }

    pub fn put_section(&mut self, mut doc: SectionDocument) -> Result<SectionDocument> {
        doc.version = self.next_version();
        self.commit(WriteOp::PutSection { doc: doc.clone() })?;
        Ok(doc)
    }

    /// Remove a property document. Its units are left to the caller.
    pub fn delete_property(&mut self, id: Uuid) -> Result<Option<PropertyDocument>> {
        let Some(previous) = self.property(id) else {
            return Ok(None);
        };
        self.commit(WriteOp::DeleteProperty { id })?;
        Ok(Some(previous))
    }

    pub fn delete_unit(&mut self, id: Uuid) -> Result<Option<UnitDocument>> {
        let Some(previous) = self.unit(id) else {
            return Ok(None);
        };
        self.commit(WriteOp::DeleteUnit { id })?;
        Ok(Some(previous))
    }

    pub fn delete_section(&mut self, id: Uuid) -> Result<Option<SectionDocument>> {
        let Some(previous) = self.section(id) else {
            return Ok(None);
        };
        self.commit(WriteOp::DeleteSection { id })?;
        Ok(Some(previous))
    }

    /// Write a snapshot of the current collections and empty the journal.
    pub fn compact(&mut self) -> Result<()> {
        {
            let guard = self.shared.read();
            write_snapshot(&self.snapshot_path, &*guard)?;
        }
        let folded = self.journal.len();
        self.journal.reset()?;
        debug!(
            "Compacted {folded} journal entries from {} into {}",
            self.journal.path().display(),
            self.snapshot_path.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn next_version(&self) -> u64 {
        self.shared.read().last_version() + 1
    }

    /// Make `op` durable in the journal, then publish it to readers.
    fn commit(&mut self, op: WriteOp) -> Result<()> {
        self.journal.append(&op)?;
        self.shared.write().apply(op);

        if self.compact_after > 0 && self.journal.len() >= self.compact_after {
            if let Err(err) = self.compact() {
                warn!("Journal compaction failed, keeping journal: {err}");
            }
        }
        Ok(())
    }
}
