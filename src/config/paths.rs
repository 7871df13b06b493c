//! Path management for the ledger
//!
//! ## Path Resolution Order
//!
//! 1. `BUDGETWISE_DATA_DIR` environment variable (if set)
//! 2. The platform data directory for `budgetwise` (via `directories`)
//!
//! ## Layout
//!
//! ```text
//! <base>/config.json
//! <base>/keys/master.key
//! <base>/records/txn/<uuid>.rec
//! <base>/records/bud/<uuid>.rec
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{LedgerError, LedgerResult};

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "BUDGETWISE_DATA_DIR";

/// Manages all paths used by one ledger installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPaths {
    base_dir: PathBuf,
}

impl LedgerPaths {
    /// Resolve the base directory from the environment or the platform
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if no home directory can be determined.
    pub fn new() -> LedgerResult<Self> {
        if let Some(custom) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(Self::with_base_dir(PathBuf::from(custom)));
        }

        let dirs = ProjectDirs::from("app", "BudgetWise", "budgetwise").ok_or_else(|| {
            LedgerError::Config("Could not determine platform-specific data dir".into())
        })?;
        Ok(Self::with_base_dir(dirs.data_dir().to_path_buf()))
    }

    /// Use an explicit base directory (useful for testing)
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join("keys")
    }

    /// Random installation key used by `FileKeyStore`
    pub fn key_file(&self) -> PathBuf {
        self.keys_dir().join("master.key")
    }

    /// Salt and check blob used by `PassphraseKeyStore`
    pub fn passphrase_params_file(&self) -> PathBuf {
        self.keys_dir().join("passphrase.json")
    }

    /// Root of the encrypted record store
    pub fn records_dir(&self) -> PathBuf {
        self.base_dir.join("records")
    }

    /// Create the base, key and record directories
    pub fn ensure_directories(&self) -> LedgerResult<()> {
        for dir in [self.base_dir.clone(), self.keys_dir(), self.records_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                LedgerError::StorageUnavailable(format!(
                    "Failed to create {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Whether a settings file has been written here
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(
            paths.key_file(),
            temp_dir.path().join("keys").join("master.key")
        );
        assert_eq!(paths.records_dir(), temp_dir.path().join("records"));
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(DATA_DIR_ENV, temp_dir.path());

        let paths = LedgerPaths::new().unwrap();
        assert_eq!(paths.base_dir(), temp_dir.path());

        std::env::remove_var(DATA_DIR_ENV);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().join("ledger"));
        assert!(!paths.is_initialized());

        paths.ensure_directories().unwrap();
        assert!(paths.keys_dir().is_dir());
        assert!(paths.records_dir().is_dir());
    }
}
