//! Persistence for the file registry.
//!
//! A registry keeps three associated stores per file id: the record itself,
//! the owner entry and an existence marker. Backends implement
//! [`RecordStore`] and must write or remove all three together.

use filereg_types::{FileId, FileRecord, Identity, StoredEntry};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryRecordStore;
pub use sled_store::SledRecordStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(
        "Inconsistent stores for file {file_id}: record={record} owner={owner} marker={marker}"
    )]
    Inconsistent {
        file_id: FileId,
        record: bool,
        owner: bool,
        marker: bool,
    },
    #[error("Stored administrator is malformed")]
    MalformedAdministrator,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of a set-once administrator write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdministratorSlot {
    /// This call stored the candidate.
    Captured(Identity),
    /// An earlier call already stored this identity.
    Existing(Identity),
}

impl AdministratorSlot {
    pub fn identity(&self) -> Identity {
        match self {
            AdministratorSlot::Captured(id) | AdministratorSlot::Existing(id) => *id,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, AdministratorSlot::Captured(_))
    }
}

/// Backend for the record store, owner index and existence marker.
pub trait RecordStore: Send + Sync {
    /// Read record and owner together. `None` when the id has no live record.
    fn load(&self, id: &FileId) -> Result<Option<StoredEntry>>;

    /// Presence check against the existence marker.
    fn contains(&self, id: &FileId) -> Result<bool>;

    /// Write record, owner and marker. Returns `false` without writing if a
    /// live record already exists.
    fn insert(&self, id: &FileId, entry: &StoredEntry) -> Result<bool>;

    /// Overwrite the record only. Returns `false` if the id is absent.
    fn replace_record(&self, id: &FileId, record: &FileRecord) -> Result<bool>;

    /// Remove record, owner and marker. Returns `false` if the id is absent.
    fn remove(&self, id: &FileId) -> Result<bool>;

    /// Administrator captured at first initialisation, if any.
    fn administrator(&self) -> Result<Option<Identity>>;

    /// Store `candidate` as administrator unless one is already set.
    fn init_administrator(&self, candidate: Identity) -> Result<AdministratorSlot>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Whether an id is live across all three stores, flagging partial state.
pub(crate) fn presence(id: &FileId, record: bool, owner: bool, marker: bool) -> Result<bool> {
    match (record, owner, marker) {
        (true, true, true) => Ok(true),
        (false, false, false) => Ok(false),
        _ => Err(StoreError::Inconsistent {
            file_id: id.clone(),
            record,
            owner,
            marker,
        }),
    }
}

/// Combine the three reads into an entry, flagging partial state.
pub(crate) fn assemble(
    id: &FileId,
    record: Option<FileRecord>,
    owner: Option<Identity>,
    marker: bool,
) -> Result<Option<StoredEntry>> {
    if !presence(id, record.is_some(), owner.is_some(), marker)? {
        return Ok(None);
    }
    Ok(record.zip(owner).map(|(record, owner)| StoredEntry { record, owner }))
}
