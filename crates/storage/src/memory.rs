//! In-memory backend (tests and ephemeral hosts).

use crate::{assemble, presence, AdministratorSlot, RecordStore, Result};
use filereg_types::{FileId, FileRecord, Identity, StoredEntry};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory record store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<MemoryRecordStoreInner>,
}

#[derive(Default)]
struct MemoryRecordStoreInner {
    /// All three stores sit behind one lock so writes never interleave.
    tables: RwLock<Tables>,
    administrator: RwLock<Option<Identity>>,
}

#[derive(Default)]
struct Tables {
    records: HashMap<FileId, FileRecord>,
    owners: HashMap<FileId, Identity>,
    markers: HashSet<FileId>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.tables.read().markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, id: &FileId) -> Result<Option<StoredEntry>> {
        let tables = self.inner.tables.read();
        assemble(
            id,
            tables.records.get(id).cloned(),
            tables.owners.get(id).copied(),
            tables.markers.contains(id),
        )
    }

    fn contains(&self, id: &FileId) -> Result<bool> {
        Ok(self.inner.tables.read().markers.contains(id))
    }

    fn insert(&self, id: &FileId, entry: &StoredEntry) -> Result<bool> {
        let mut tables = self.inner.tables.write();
        if tables.markers.contains(id) {
            return Ok(false);
        }
        tables.records.insert(id.clone(), entry.record.clone());
        tables.owners.insert(id.clone(), entry.owner);
        tables.markers.insert(id.clone());
        Ok(true)
    }

    fn replace_record(&self, id: &FileId, record: &FileRecord) -> Result<bool> {
        let mut tables = self.inner.tables.write();
        match tables.records.get_mut(id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: &FileId) -> Result<bool> {
        let mut tables = self.inner.tables.write();
        let live = presence(
            id,
            tables.records.contains_key(id),
            tables.owners.contains_key(id),
            tables.markers.contains(id),
        )?;
        if live {
            tables.records.remove(id);
            tables.owners.remove(id);
            tables.markers.remove(id);
        }
        Ok(live)
    }

    fn administrator(&self) -> Result<Option<Identity>> {
        Ok(*self.inner.administrator.read())
    }

    fn init_administrator(&self, candidate: Identity) -> Result<AdministratorSlot> {
        let mut slot = self.inner.administrator.write();
        match *slot {
            Some(existing) => Ok(AdministratorSlot::Existing(existing)),
            None => {
                *slot = Some(candidate);
                Ok(AdministratorSlot::Captured(candidate))
            }
        }
    }
}
