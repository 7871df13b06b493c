//! Transaction model
//!
//! A transaction is an immutable-id record of money coming in, going out, or
//! moving between the user's own accounts. Edits replace every field except
//! the id and the kind.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::TransactionId;
use super::money::Money;

/// The direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Money received; raises the balance
    Income,
    /// Money spent; lowers the balance and counts against budgets
    Expense,
    /// Money moved between the user's own accounts; balance-neutral
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = TransactionValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(TransactionValidationError::UnknownKind(s.to_string())),
        }
    }
}

/// Caller-supplied transaction fields, used for both adds and full replaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub amount: Money,
    pub description: String,
    /// Case-sensitive key matched against budget categories
    pub category: String,
    /// Stored exactly as provided; no timezone conversion
    pub date: NaiveDateTime,
    pub kind: TransactionKind,
}

impl TransactionDraft {
    pub fn new(
        kind: TransactionKind,
        amount: Money,
        category: impl Into<String>,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            amount,
            description: String::new(),
            category: category.into(),
            date,
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

/// A financial transaction held in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub date: NaiveDateTime,
    pub kind: TransactionKind,
}

impl Transaction {
    /// Build a transaction from a validated draft
    pub fn from_draft(id: TransactionId, draft: TransactionDraft) -> Self {
        Self {
            id,
            amount: draft.amount,
            description: draft.description,
            category: draft.category,
            date: draft.date,
            kind: draft.kind,
        }
    }

    /// Produce the full replacement for this record.
    ///
    /// The id is preserved; the kind may not change.
    pub fn replaced_with(&self, draft: TransactionDraft) -> Result<Self, TransactionValidationError> {
        draft.validate()?;
        if draft.kind != self.kind {
            return Err(TransactionValidationError::KindChanged {
                from: self.kind,
                to: draft.kind,
            });
        }
        Ok(Self::from_draft(self.id, draft))
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }

    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }

    /// Check the record-level invariants (used when loading persisted records)
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NonPositiveAmount(Money),
    UnknownKind(String),
    KindChanged {
        from: TransactionKind,
        to: TransactionKind,
    },
    /// Accepting the amount would push ledger totals past the range of [`Money`]
    TotalsOverflow(Money),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount(amount) => {
                write!(f, "Amount must be greater than zero, got {}", amount)
            }
            Self::UnknownKind(kind) => write!(f, "Unknown transaction type '{}'", kind),
            Self::KindChanged { from, to } => write!(
                f,
                "Transaction type is immutable (was {}, requested {})",
                from, to
            ),
            Self::TotalsOverflow(amount) => write!(
                f,
                "Amount {} would overflow the ledger totals",
                amount
            ),
        }
    }
}

impl std::error::Error for TransactionValidationError {}
