//! Storage layer for the ledger
//!
//! Provides an encrypted one-file-per-record store with atomic, durable
//! writes and per-record locking.

pub mod encrypted_store;
pub mod file_io;
pub mod records;

pub use encrypted_store::{EncryptedStore, RecordScan, ScanEntry};
pub use file_io::{read_json, write_json_atomic};
pub use records::{BudgetRecord, RecordId, RecordKind, TransactionRecord, RECORD_SCHEMA_VERSION};
