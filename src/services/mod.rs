//! Ledger services
//!
//! The repository owns canonical state, the insight engine observes it and
//! the handle exposes mutations to async callers.

pub mod handle;
pub mod insights;
pub mod ledger;

pub use handle::LedgerHandle;
pub use insights::{evaluate, Insight, InsightEngine, InsightKind, MAX_INSIGHTS};
pub use ledger::{LedgerObserver, LedgerRepository};
