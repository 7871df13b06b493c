//! Custom error types for the BudgetWise core
//!
//! Every storage, crypto and validation failure is surfaced to the caller as
//! a typed `LedgerError`. The variants group into five classes: validation
//! (caller input), not-found, integrity (a record failed authentication),
//! transient storage failures and key unavailability.

use thiserror::Error;

use crate::models::{BudgetValidationError, TransactionValidationError};

/// The main error type for ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A transaction failed validation (amount, type, or immutable field change)
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A budget failed validation (non-positive limit, empty category)
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Sealed data failed authentication or could not be decoded
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Transient I/O failure; the operation had no effect and may be retried
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The key store could not produce the encryption key
    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encoding a record failed before anything was written
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for budgets
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was caused by invalid caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransaction(_) | Self::InvalidBudget(_) | Self::Duplicate { .. }
        )
    }

    /// Check if this is an integrity (corrupted or tampered data) error
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    /// Short, data-free label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::InvalidBudget(_) => "invalid_budget",
            Self::NotFound { .. } => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::Integrity(_) => "integrity",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::KeyUnavailable(_) => "key_unavailable",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<TransactionValidationError> for LedgerError {
    fn from(err: TransactionValidationError) -> Self {
        Self::InvalidTransaction(err.to_string())
    }
}

impl From<BudgetValidationError> for LedgerError {
    fn from(err: BudgetValidationError) -> Self {
        Self::InvalidBudget(err.to_string())
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = LedgerError::budget_not_found("Groceries");
        assert_eq!(err.to_string(), "Budget not found: Groceries");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_class() {
        assert!(LedgerError::InvalidTransaction("amount".into()).is_validation());
        assert!(LedgerError::InvalidBudget("limit".into()).is_validation());
        assert!(LedgerError::Duplicate {
            entity_type: "Budget",
            identifier: "Rent".into()
        }
        .is_validation());
        assert!(!LedgerError::Integrity("tag".into()).is_validation());
    }

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(LedgerError::StorageUnavailable("disk".into()).is_retryable());
        assert!(!LedgerError::KeyUnavailable("keystore".into()).is_retryable());
        assert!(!LedgerError::Integrity("tag".into()).is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(LedgerError::Integrity("x".into()).kind(), "integrity");
        assert_eq!(LedgerError::transaction_not_found("t").kind(), "not_found");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LedgerError = io_err.into();
        assert!(matches!(err, LedgerError::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }
}
