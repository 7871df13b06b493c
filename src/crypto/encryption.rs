//! AES-256-GCM sealing of byte payloads
//!
//! A sealed blob is self-describing:
//!
//! ```text
//! magic "BWK1" (4) | key version u32 BE (4) | nonce (12) | ciphertext + tag
//! ```
//!
//! The 8-byte header and a caller-supplied context are authenticated as
//! associated data, so changing the key version, moving a blob to another
//! record, or flipping any byte makes [`open`] fail with an integrity error.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{LedgerError, LedgerResult};

use super::secure_memory::SecretKey;

/// Format marker at the start of every sealed blob
pub const MAGIC: [u8; 4] = *b"BWK1";

/// Size of the authenticated header (magic + key version)
pub const HEADER_SIZE: usize = 8;

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag
const TAG_SIZE: usize = 16;

fn header(key_version: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&MAGIC);
    header[4..].copy_from_slice(&key_version.to_be_bytes());
    header
}

fn associated_data(header: &[u8], context: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(header.len() + context.len());
    aad.extend_from_slice(header);
    aad.extend_from_slice(context);
    aad
}

fn cipher(key: &SecretKey) -> LedgerResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| LedgerError::KeyUnavailable(format!("Failed to create cipher: {}", e)))
}

/// Read the key version a blob claims to be sealed under
pub fn key_version_of(blob: &[u8]) -> LedgerResult<u32> {
    if blob.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(LedgerError::Integrity(format!(
            "Sealed blob too short: {} bytes",
            blob.len()
        )));
    }
    if blob[..4] != MAGIC {
        return Err(LedgerError::Integrity("Unrecognized blob format".into()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&blob[4..HEADER_SIZE]);
    Ok(u32::from_be_bytes(version))
}

/// Encrypt `plaintext` under `key`, binding it to `context`
///
/// Generates a random nonce for each call.
pub fn seal(
    plaintext: &[u8],
    context: &[u8],
    key: &SecretKey,
    key_version: u32,
) -> LedgerResult<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let header = header(key_version);
    let aad = associated_data(&header, context);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| LedgerError::Serialization(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&header);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Authenticate and decrypt a blob produced by [`seal`]
///
/// `key_version` is the version of `key`; a blob claiming any other version
/// is rejected before decryption is attempted.
pub fn open(blob: &[u8], context: &[u8], key: &SecretKey, key_version: u32) -> LedgerResult<Vec<u8>> {
    let claimed = key_version_of(blob)?;
    if claimed != key_version {
        return Err(LedgerError::Integrity(format!(
            "Blob sealed under unknown key version {}",
            claimed
        )));
    }

    let cipher = cipher(key)?;
    let (header, rest) = blob.split_at(HEADER_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
    let aad = associated_data(header, context);

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| {
            LedgerError::Integrity("Decryption failed: invalid key or corrupted data".into())
        })
}
