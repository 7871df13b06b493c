//! Record addressing and the persisted record payloads
//!
//! Every transaction and budget is stored as one sealed record addressed by
//! a stable [`RecordId`]. Ids reveal only the record kind and an opaque UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Budget, BudgetId, Transaction, TransactionId};

/// Schema version of the decrypted record payloads
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// The kind of entity a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Transaction,
    Budget,
}

impl RecordKind {
    /// Short prefix used in record ids and on-disk directories
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Transaction => "txn",
            Self::Budget => "bud",
        }
    }

    pub fn all() -> [RecordKind; 2] {
        [Self::Transaction, Self::Budget]
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "txn" => Some(Self::Transaction),
            "bud" => Some(Self::Budget),
            _ => None,
        }
    }
}

/// Stable address of one persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub kind: RecordKind,
    pub id: Uuid,
}

impl RecordId {
    pub fn new(kind: RecordKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn transaction(id: TransactionId) -> Self {
        Self::new(RecordKind::Transaction, *id.as_uuid())
    }

    pub fn budget(id: BudgetId) -> Self {
        Self::new(RecordKind::Budget, *id.as_uuid())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.prefix(), self.id)
    }
}

impl FromStr for RecordId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::Integrity(format!("Invalid record id '{}'", s));
        let (prefix, id) = s.split_once('/').ok_or_else(invalid)?;
        let kind = RecordKind::from_prefix(prefix).ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;
        Ok(Self { kind, id })
    }
}

/// Decrypted payload of a transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub schema_version: u32,
    /// Insertion sequence, used to break ties between equal dates
    pub seq: u64,
    pub transaction: Transaction,
}

/// Decrypted payload of a budget record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub schema_version: u32,
    pub seq: u64,
    pub budget: Budget,
}

pub fn encode<T: Serialize>(record: &T) -> LedgerResult<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a decrypted payload; malformed payloads are integrity failures
pub fn decode<T: for<'de> Deserialize<'de>>(record_id: &RecordId, bytes: &[u8]) -> LedgerResult<T> {
    // Only the position is reported; serde messages can quote field values.
    serde_json::from_slice(bytes).map_err(|e| {
        LedgerError::Integrity(format!(
            "Record {} could not be decoded (line {}, column {})",
            record_id,
            e.line(),
            e.column()
        ))
    })
}
