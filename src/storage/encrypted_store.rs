//! Encrypted record store
//!
//! One file per record under `<root>/<kind>/<uuid>.rec`. Values are sealed by
//! the [`KeyManager`] before they touch disk and opened after they are read;
//! each blob is bound to its record id, so moving a file onto another record
//! fails authentication.
//!
//! Same-record `put`/`get`/`delete` calls are serialized by a per-record
//! lock; calls on different records proceed in parallel.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::crypto::KeyManager;
use crate::error::{LedgerError, LedgerResult};

use super::file_io::{read_bytes, remove_file, write_bytes_atomic};
use super::records::{RecordId, RecordKind};

const RECORD_EXTENSION: &str = "rec";

fn storage_error(action: &str, target: impl std::fmt::Display, err: io::Error) -> LedgerError {
    LedgerError::StorageUnavailable(format!("Failed to {} {}: {}", action, target, err))
}

fn lock_poisoned(record_id: &RecordId) -> LedgerError {
    LedgerError::StorageUnavailable(format!("Lock poisoned for {}", record_id))
}

/// Durable, encrypted key-value storage for ledger records
pub struct EncryptedStore {
    root: PathBuf,
    keys: Arc<KeyManager>,
    locks: Mutex<HashMap<RecordId, Arc<RwLock<()>>>>,
}

impl EncryptedStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>, keys: Arc<KeyManager>) -> LedgerResult<Self> {
        let root = root.into();
        for kind in RecordKind::all() {
            let dir = root.join(kind.prefix());
            fs::create_dir_all(&dir).map_err(|e| storage_error("create", dir.display(), e))?;
        }
        Ok(Self {
            root,
            keys,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    fn dir_for(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.prefix())
    }

    fn path_for(&self, record_id: &RecordId) -> PathBuf {
        self.dir_for(record_id.kind)
            .join(format!("{}.{}", record_id.id, RECORD_EXTENSION))
    }

    fn lock_for(&self, record_id: &RecordId) -> LedgerResult<Arc<RwLock<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::StorageUnavailable("Record lock table poisoned".into()))?;
        Ok(Arc::clone(locks.entry(*record_id).or_default()))
    }

    /// Drop a lock handle, forgetting the entry once nobody else holds it
    fn release_lock(&self, record_id: &RecordId, lock: Arc<RwLock<()>>) {
        drop(lock);
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks
            .get(record_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(record_id);
        }
    }

    /// Seal and durably write a record, replacing any previous value.
    ///
    /// The data is on disk when this returns `Ok`.
    pub fn put(&self, record_id: &RecordId, value: &[u8]) -> LedgerResult<()> {
        let context = record_id.to_string();
        let blob = self.keys.seal(value, context.as_bytes())?;

        let lock = self.lock_for(record_id)?;
        let result = match lock.write() {
            Ok(_guard) => write_bytes_atomic(&self.path_for(record_id), &blob, true)
                .map_err(|e| storage_error("write", record_id, e)),
            Err(_) => Err(lock_poisoned(record_id)),
        };
        self.release_lock(record_id, lock);
        result
    }

    /// Read and open a record; `None` when no such record exists
    pub fn get(&self, record_id: &RecordId) -> LedgerResult<Option<Vec<u8>>> {
        let lock = self.lock_for(record_id)?;
        let blob = match lock.read() {
            Ok(_guard) => read_bytes(&self.path_for(record_id))
                .map_err(|e| storage_error("read", record_id, e)),
            Err(_) => Err(lock_poisoned(record_id)),
        };
        self.release_lock(record_id, lock);

        match blob? {
            Some(blob) => {
                let context = record_id.to_string();
                self.keys.open(&blob, context.as_bytes()).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Remove a record, returning whether it existed
    pub fn delete(&self, record_id: &RecordId) -> LedgerResult<bool> {
        let lock = self.lock_for(record_id)?;
        let result = match lock.write() {
            Ok(_guard) => remove_file(&self.path_for(record_id))
                .map_err(|e| storage_error("delete", record_id, e)),
            Err(_) => Err(lock_poisoned(record_id)),
        };
        self.release_lock(record_id, lock);
        result
    }

    /// Lazily iterate over every record of one kind
    ///
    /// Records are read and decrypted only as the iterator advances.
    pub fn scan(&self, kind: RecordKind) -> LedgerResult<RecordScan<'_>> {
        let dir = self.dir_for(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => Some(entries),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(storage_error("list", dir.display(), err)),
        };
        Ok(RecordScan {
            store: self,
            kind,
            entries,
        })
    }
}

/// One record yielded by a scan
#[derive(Debug)]
pub struct ScanEntry {
    pub record_id: RecordId,
    /// The decrypted value, or why it could not be produced
    pub value: LedgerResult<Vec<u8>>,
}

/// Lazy iterator returned by [`EncryptedStore::scan`]
///
/// Outer errors are directory-level I/O failures; a single unreadable or
/// tampered record shows up as an entry whose `value` is an error.
pub struct RecordScan<'a> {
    store: &'a EncryptedStore,
    kind: RecordKind,
    entries: Option<fs::ReadDir>,
}

impl Iterator for RecordScan<'_> {
    type Item = LedgerResult<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries.as_mut()?;
        loop {
            let entry = match entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    return Some(Err(storage_error(
                        "list",
                        self.store.dir_for(self.kind).display(),
                        err,
                    )))
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(uuid) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                tracing::warn!(path = %path.display(), "skipping record file with invalid name");
                continue;
            };

            let record_id = RecordId::new(self.kind, uuid);
            match self.store.get(&record_id) {
                // removed between listing and reading
                Ok(None) => continue,
                Ok(Some(value)) => {
                    return Some(Ok(ScanEntry {
                        record_id,
                        value: Ok(value),
                    }))
                }
                Err(err) => {
                    return Some(Ok(ScanEntry {
                        record_id,
                        value: Err(err),
                    }))
                }
            }
        }
    }
}
