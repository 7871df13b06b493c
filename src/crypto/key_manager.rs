//! Key manager: the only holder of the ledger key
//!
//! The key is fetched from the [`KeyStore`] on first use and cached. While
//! the store is failing every crypto call fails with `KeyUnavailable`; the
//! manager never falls back to passing plaintext through.

use std::sync::{Arc, RwLock};

use crate::error::{LedgerError, LedgerResult};

use super::encryption;
use super::key_store::{KeyStore, VersionedKey};

/// Non-secret description of the active key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub version: u32,
}

/// Encrypts and decrypts payloads with the installation key
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    cached: RwLock<Option<Arc<VersionedKey>>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    fn key(&self) -> LedgerResult<Arc<VersionedKey>> {
        if let Ok(cached) = self.cached.read() {
            if let Some(key) = cached.as_ref() {
                return Ok(Arc::clone(key));
            }
        }

        let mut cached = self
            .cached
            .write()
            .map_err(|_| LedgerError::KeyUnavailable("Key cache lock poisoned".into()))?;
        if let Some(key) = cached.as_ref() {
            return Ok(Arc::clone(key));
        }

        let key = Arc::new(self.store.get_or_create().map_err(|e| match e {
            LedgerError::KeyUnavailable(_) => e,
            other => LedgerError::KeyUnavailable(other.to_string()),
        })?);
        tracing::debug!(version = key.version, "ledger key loaded");
        *cached = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Load (or create on first run) the installation key
    ///
    /// Only the key version is returned; key bytes stay inside the manager.
    pub fn get_or_create_key(&self) -> LedgerResult<KeyInfo> {
        self.key().map(|key| KeyInfo {
            version: key.version,
        })
    }

    /// Authenticated encryption of `plaintext`
    pub fn encrypt(&self, plaintext: &[u8]) -> LedgerResult<Vec<u8>> {
        self.seal(plaintext, &[])
    }

    /// Decrypt a blob from [`encrypt`](Self::encrypt)
    ///
    /// Tampered blobs and blobs from another key fail with `LedgerError::Integrity`.
    pub fn decrypt(&self, blob: &[u8]) -> LedgerResult<Vec<u8>> {
        self.open(blob, &[])
    }

    /// Encrypt and bind the blob to `context` (authenticated, not stored)
    pub fn seal(&self, plaintext: &[u8], context: &[u8]) -> LedgerResult<Vec<u8>> {
        let key = self.key()?;
        encryption::seal(plaintext, context, &key.key, key.version)
    }

    /// Decrypt a blob sealed with the same `context`
    pub fn open(&self, blob: &[u8], context: &[u8]) -> LedgerResult<Vec<u8>> {
        let key = self.key()?;
        encryption::open(blob, context, &key.key, key.version)
    }
}
