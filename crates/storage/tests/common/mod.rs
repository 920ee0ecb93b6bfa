use filereg_storage::{SledRecordStore, StoreError};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Reopen a sled database whose previous handle was just dropped.
///
/// sled's background flusher can still hold the file lock for a moment after
/// the last `Db` handle goes away.
pub fn reopen(path: &Path) -> SledRecordStore {
    let mut attempts = 0;
    loop {
        match SledRecordStore::new(path) {
            Ok(store) => return store,
            Err(StoreError::Database(err)) if attempts < 50 => {
                attempts += 1;
                eprintln!("reopen attempt {attempts} failed: {err}");
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("reopen {}: {err}", path.display()),
        }
    }
}
