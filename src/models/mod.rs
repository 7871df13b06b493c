//! Core data models for the ledger
//!
//! Transactions and budgets, the fixed-point `Money` type, typed ids and the
//! monthly reporting period.

pub mod budget;
pub mod ids;
pub mod money;
pub mod period;
pub mod transaction;

pub use budget::{validate_limit, Budget, BudgetStatus, BudgetSummary, BudgetValidationError};
pub use ids::{BudgetId, TransactionId};
pub use money::{Money, MoneyParseError};
pub use period::Period;
pub use transaction::{Transaction, TransactionDraft, TransactionKind, TransactionValidationError};
