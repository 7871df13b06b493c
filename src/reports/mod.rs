//! Derived ledger views
//!
//! Snapshots are rebuilt from canonical records on every commit and shared
//! read-only with subscribers and the insight engine.

pub mod snapshot;

pub use snapshot::LedgerSnapshot;
