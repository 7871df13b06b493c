//! BudgetWise core - encrypted local ledger with reactive budget views
//!
//! This library is the data engine behind the BudgetWise personal finance
//! tracker: an encrypted, locally persisted ledger of transactions and
//! budgets, aggregate views pushed to subscribers, and an on-device insight
//! generator. It has no UI, network or CLI surface.
//!
//! # Architecture
//!
//! - `crypto`: key stores and the key manager (AES-256-GCM, Argon2id)
//! - `storage`: encrypted one-file-per-record store
//! - `models`: transactions, budgets, fixed-point money, periods
//! - `reports`: immutable ledger snapshots with every derived view
//! - `events`: per-view publish/subscribe channels
//! - `services`: the ledger repository, insight engine and async handle
//! - `config`: paths and settings
//! - `logging`: optional `tracing` subscriber setup
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use budgetwise::clock::SystemClock;
//! use budgetwise::config::LedgerPaths;
//! use budgetwise::crypto::FileKeyStore;
//! use budgetwise::services::{InsightEngine, LedgerRepository};
//!
//! # fn main() -> budgetwise::LedgerResult<()> {
//! let paths = LedgerPaths::new()?;
//! let keys = Arc::new(FileKeyStore::new(paths.key_file()));
//! let ledger = LedgerRepository::open_in(&paths, keys, Arc::new(SystemClock))?;
//! let insights = InsightEngine::attach_to(&ledger)?;
//!
//! let mut balance = ledger.get_total_balance();
//! let mut messages = insights.get_insights();
//! # let _ = (balance.try_recv(), messages.try_recv());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;

pub use error::{LedgerError, LedgerResult};
pub use models::{Budget, BudgetStatus, Money, Transaction, TransactionDraft, TransactionId, TransactionKind};
pub use services::{InsightEngine, LedgerHandle, LedgerRepository};
