//! Cryptographic functions for the ledger
//!
//! Provides AES-256-GCM sealing of records, with the key supplied by a
//! durable [`KeyStore`] (random key file or Argon2id passphrase derivation)
//! and held only by the [`KeyManager`].

pub mod encryption;
pub mod key_derivation;
pub mod key_manager;
pub mod key_store;
pub mod secure_memory;

pub use key_derivation::{derive_key, KeyDerivationParams};
pub use key_manager::{KeyInfo, KeyManager};
pub use key_store::{
    FileKeyStore, KeyStore, MemoryKeyStore, PassphraseKeyStore, VersionedKey, CURRENT_KEY_VERSION,
};
pub use secure_memory::{SecretKey, SecureString};
