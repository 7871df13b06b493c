//! Durable sources for the ledger key
//!
//! A [`KeyStore`] hands the key manager the same key on every start of a
//! given installation. Raw key bytes never leave the `crypto` module.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{LedgerError, LedgerResult};
use crate::storage::file_io::write_bytes_atomic;

use super::encryption::{open, seal};
use super::key_derivation::{derive_key, KeyDerivationParams};
use super::secure_memory::{SecretKey, SecureString};

/// Key version written by this release
pub const CURRENT_KEY_VERSION: u32 = 1;

const KEY_CHECK_PLAINTEXT: &[u8] = b"budgetwise-key-check";
const KEY_CHECK_CONTEXT: &[u8] = b"key-check";

/// A key together with the version recorded in every blob it seals
#[derive(Clone)]
pub struct VersionedKey {
    pub version: u32,
    pub(crate) key: SecretKey,
}

impl VersionedKey {
    pub fn new(version: u32, key: SecretKey) -> Self {
        Self { version, key }
    }
}

impl fmt::Debug for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedKey")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Provides the installation's encryption key, creating it on first use
pub trait KeyStore: Send + Sync {
    /// Return the key for this installation.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::KeyUnavailable` if the backing store cannot be
    /// read or written, or holds an unusable key.
    fn get_or_create(&self) -> LedgerResult<VersionedKey>;
}

/// In-process key, for tests and ephemeral ledgers
#[derive(Debug, Clone)]
pub struct MemoryKeyStore {
    key: VersionedKey,
}

impl MemoryKeyStore {
    /// A store holding a freshly generated key
    pub fn generate() -> Self {
        Self::new(VersionedKey::new(CURRENT_KEY_VERSION, SecretKey::generate()))
    }

    pub fn new(key: VersionedKey) -> Self {
        Self { key }
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_or_create(&self) -> LedgerResult<VersionedKey> {
        Ok(self.key.clone())
    }
}

#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    key: String,
}

fn key_unavailable(path: &Path, what: &str, err: impl fmt::Display) -> LedgerError {
    LedgerError::KeyUnavailable(format!("{} {}: {}", what, path.display(), err))
}

/// Whether key material exists at `path`
///
/// Only a definite "not found" allows a new key to be created; any other
/// failure to inspect the path is `KeyUnavailable`.
fn key_material_exists(path: &Path) -> LedgerResult<bool> {
    path.try_exists()
        .map_err(|e| key_unavailable(path, "Cannot inspect", e))
}

/// A random key kept in an owner-only file
///
/// On Unix the file is created with mode `0600`.
pub struct FileKeyStore {
    path: PathBuf,
    create_lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> LedgerResult<VersionedKey> {
        let contents = Zeroizing::new(
            std::fs::read(&self.path).map_err(|e| key_unavailable(&self.path, "Failed to read", e))?,
        );
        let file: KeyFile = serde_json::from_slice(&contents)
            .map_err(|e| key_unavailable(&self.path, "Malformed key file", e))?;
        let file_key = Zeroizing::new(file.key);
        let raw = Zeroizing::new(
            STANDARD
                .decode(file_key.as_bytes())
                .map_err(|e| key_unavailable(&self.path, "Invalid key encoding in", e))?,
        );
        let key = SecretKey::from_slice(&raw)
            .ok_or_else(|| key_unavailable(&self.path, "Wrong key length in", raw.len()))?;
        Ok(VersionedKey::new(file.version, key))
    }

    fn create(&self) -> LedgerResult<VersionedKey> {
        let key = VersionedKey::new(CURRENT_KEY_VERSION, SecretKey::generate());
        let file = KeyFile {
            version: key.version,
            key: STANDARD.encode(key.key.as_bytes()),
        };
        let encoded = Zeroizing::new(
            serde_json::to_vec(&file).map_err(|e| key_unavailable(&self.path, "Failed to encode", e))?,
        );
        drop(Zeroizing::new(file.key));

        write_bytes_atomic(&self.path, &encoded, true)
            .map_err(|e| key_unavailable(&self.path, "Failed to write", e))?;
        tracing::info!(path = %self.path.display(), version = key.version, "created ledger key");
        Ok(key)
    }
}

impl KeyStore for FileKeyStore {
    fn get_or_create(&self) -> LedgerResult<VersionedKey> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| LedgerError::KeyUnavailable("Key store lock poisoned".into()))?;

        if key_material_exists(&self.path)? {
            self.read()
        } else {
            self.create()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PassphraseFile {
    version: u32,
    params: KeyDerivationParams,
    /// Known plaintext sealed with the derived key, used to detect a wrong passphrase
    check: String,
}

/// A key derived from a passphrase with Argon2id
///
/// The salt and a verification blob are persisted next to the ledger; the
/// passphrase itself is never written.
pub struct PassphraseKeyStore {
    passphrase: SecureString,
    params_path: PathBuf,
    template: KeyDerivationParams,
    create_lock: Mutex<()>,
}

impl PassphraseKeyStore {
    pub fn new(passphrase: impl Into<SecureString>, params_path: impl Into<PathBuf>) -> Self {
        Self::with_params(passphrase, params_path, KeyDerivationParams::new())
    }

    /// Use the given parameters when no params file exists yet
    pub fn with_params(
        passphrase: impl Into<SecureString>,
        params_path: impl Into<PathBuf>,
        template: KeyDerivationParams,
    ) -> Self {
        Self {
            passphrase: passphrase.into(),
            params_path: params_path.into(),
            template,
            create_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> LedgerResult<VersionedKey> {
        let contents = std::fs::read(&self.params_path)
            .map_err(|e| key_unavailable(&self.params_path, "Failed to read", e))?;
        let file: PassphraseFile = serde_json::from_slice(&contents)
            .map_err(|e| key_unavailable(&self.params_path, "Malformed key parameters", e))?;

        let key = derive_key(&self.passphrase, &file.params)?;
        let check = STANDARD
            .decode(file.check.as_bytes())
            .map_err(|e| key_unavailable(&self.params_path, "Invalid check encoding in", e))?;

        match open(&check, KEY_CHECK_CONTEXT, &key, file.version) {
            Ok(plaintext) if plaintext == KEY_CHECK_PLAINTEXT => {
                Ok(VersionedKey::new(file.version, key))
            }
            _ => Err(LedgerError::KeyUnavailable("Incorrect passphrase".into())),
        }
    }

    fn create(&self) -> LedgerResult<VersionedKey> {
        let key = derive_key(&self.passphrase, &self.template)?;
        let check = seal(KEY_CHECK_PLAINTEXT, KEY_CHECK_CONTEXT, &key, CURRENT_KEY_VERSION)?;
        let file = PassphraseFile {
            version: CURRENT_KEY_VERSION,
            params: self.template.clone(),
            check: STANDARD.encode(check),
        };
        let encoded = serde_json::to_vec_pretty(&file)
            .map_err(|e| key_unavailable(&self.params_path, "Failed to encode", e))?;

        write_bytes_atomic(&self.params_path, &encoded, true)
            .map_err(|e| key_unavailable(&self.params_path, "Failed to write", e))?;
        Ok(VersionedKey::new(CURRENT_KEY_VERSION, key))
    }
}

impl KeyStore for PassphraseKeyStore {
    fn get_or_create(&self) -> LedgerResult<VersionedKey> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| LedgerError::KeyUnavailable("Key store lock poisoned".into()))?;

        if key_material_exists(&self.params_path)? {
            self.read()
        } else {
            self.create()
        }
    }
}
