//! Sled-backed record store.

use crate::{assemble, presence, AdministratorSlot, RecordStore, Result, StoreError};
use filereg_types::{FileId, FileRecord, Identity, StoredEntry};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

const ADMINISTRATOR_KEY: &[u8] = b"administrator";
const MARKER: &[u8] = &[1u8];

/// Sled-backed implementation
pub struct SledRecordStore {
    db: Db,
    records: Tree,
    owners: Tree,
    markers: Tree,
    metadata: Tree,
}

impl SledRecordStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let records = db.open_tree("records")?;
        let owners = db.open_tree("owners")?;
        let markers = db.open_tree("markers")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            records,
            owners,
            markers,
            metadata,
        })
    }

    /// Number of existence markers, i.e. live records.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

fn storage_error(err: TransactionError<()>) -> StoreError {
    match err {
        TransactionError::Storage(err) => StoreError::Database(err),
        // Closures below never abort.
        TransactionError::Abort(()) => StoreError::Database(sled::Error::Unsupported(
            "unexpected transaction abort".to_string(),
        )),
    }
}

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<()>>;

/// Presence bits (record, owner, marker) carried out of an aborted removal.
type Partial = (bool, bool, bool);
type RemoveTx = std::result::Result<bool, ConflictableTransactionError<Partial>>;

impl RecordStore for SledRecordStore {
    fn load(&self, id: &FileId) -> Result<Option<StoredEntry>> {
        let key = id.as_bytes();
        let (record, owner, marker) = (&self.records, &self.owners, &self.markers)
            .transaction(|(records, owners, markers)| -> TxResult<_> {
                Ok((records.get(key)?, owners.get(key)?, markers.get(key)?))
            })
            .map_err(storage_error)?;

        let record = record
            .map(|v| serde_json::from_slice::<FileRecord>(&v))
            .transpose()?;
        let owner = owner
            .map(|v| serde_json::from_slice::<Identity>(&v))
            .transpose()?;

        assemble(id, record, owner, marker.is_some())
    }

    fn contains(&self, id: &FileId) -> Result<bool> {
        Ok(self.markers.contains_key(id.as_bytes())?)
    }

    fn insert(&self, id: &FileId, entry: &StoredEntry) -> Result<bool> {
        let key = id.as_bytes();
        let record = serde_json::to_vec(&entry.record)?;
        let owner = serde_json::to_vec(&entry.owner)?;

        (&self.records, &self.owners, &self.markers)
            .transaction(|(records, owners, markers)| -> TxResult<bool> {
                if markers.get(key)?.is_some() {
                    return Ok(false);
                }
                records.insert(key, record.as_slice())?;
                owners.insert(key, owner.as_slice())?;
                markers.insert(key, MARKER)?;
                Ok(true)
            })
            .map_err(storage_error)
    }

    fn replace_record(&self, id: &FileId, record: &FileRecord) -> Result<bool> {
        let key = id.as_bytes();
        let record = serde_json::to_vec(record)?;

        (&self.records, &self.markers)
            .transaction(|(records, markers)| -> TxResult<bool> {
                if markers.get(key)?.is_none() {
                    return Ok(false);
                }
                records.insert(key, record.as_slice())?;
                Ok(true)
            })
            .map_err(storage_error)
    }

    fn remove(&self, id: &FileId) -> Result<bool> {
        let key = id.as_bytes();

        let outcome = (&self.records, &self.owners, &self.markers).transaction(
            |(records, owners, markers)| -> RemoveTx {
                let bits = (
                    records.get(key)?.is_some(),
                    owners.get(key)?.is_some(),
                    markers.get(key)?.is_some(),
                );
                match bits {
                    (true, true, true) => {
                        records.remove(key)?;
                        owners.remove(key)?;
                        markers.remove(key)?;
                        Ok(true)
                    }
                    (false, false, false) => Ok(false),
                    partial => Err(ConflictableTransactionError::Abort(partial)),
                }
            },
        );

        match outcome {
            Ok(removed) => Ok(removed),
            Err(TransactionError::Abort((record, owner, marker))) => {
                presence(id, record, owner, marker)
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn administrator(&self) -> Result<Option<Identity>> {
        self.metadata
            .get(ADMINISTRATOR_KEY)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn init_administrator(&self, candidate: Identity) -> Result<AdministratorSlot> {
        let encoded = serde_json::to_vec(&candidate)?;
        let swapped = self.metadata.compare_and_swap(
            ADMINISTRATOR_KEY,
            None as Option<&[u8]>,
            Some(encoded.as_slice()),
        )?;

        match swapped {
            Ok(()) => Ok(AdministratorSlot::Captured(candidate)),
            Err(cas) => {
                let current = cas.current.ok_or(StoreError::MalformedAdministrator)?;
                Ok(AdministratorSlot::Existing(serde_json::from_slice(&current)?))
            }
        }
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
