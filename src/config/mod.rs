//! Configuration module
//!
//! - Platform path resolution with an environment override
//! - Persisted ledger settings

pub mod paths;
pub mod settings;

pub use paths::LedgerPaths;
pub use settings::Settings;
