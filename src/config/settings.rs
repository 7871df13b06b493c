//! Ledger settings
//!
//! The single configuration surface of the core: the spending-trend alert
//! threshold and the default recent-transactions window. Everything else
//! (monthly period, insight cap, near-limit band) is fixed.

use serde::{Deserialize, Serialize};

use super::paths::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::{read_json, write_json_atomic};

/// User settings for one ledger installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Fractional increase over last month's spending that raises a trend
    /// insight (0.20 = 20%)
    #[serde(default = "default_trend_alert_threshold")]
    pub trend_alert_threshold: f64,

    /// How many transactions `recent transactions` views hold by default
    #[serde(default = "default_recent_transactions_window")]
    pub recent_transactions_window: usize,

    /// Default `tracing` filter when the host installs our subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_trend_alert_threshold() -> f64 {
    0.20
}

fn default_recent_transactions_window() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            trend_alert_threshold: default_trend_alert_threshold(),
            recent_transactions_window: default_recent_transactions_window(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if no settings file exists
    ///
    /// Loaded settings are validated; defaults are not written back.
    pub fn load_or_create(paths: &LedgerPaths) -> LedgerResult<Self> {
        let settings: Settings = read_json(paths.settings_file())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate and atomically save settings
    pub fn save(&self, paths: &LedgerPaths) -> LedgerResult<()> {
        self.validate()?;
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if !self.trend_alert_threshold.is_finite() || self.trend_alert_threshold < 0.0 {
            return Err(LedgerError::Config(format!(
                "trend_alert_threshold must be a non-negative fraction, got {}",
                self.trend_alert_threshold
            )));
        }
        if self.recent_transactions_window == 0 {
            return Err(LedgerError::Config(
                "recent_transactions_window must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Trend threshold in basis points (0.20 -> 2000)
    pub fn trend_threshold_basis_points(&self) -> i64 {
        (self.trend_alert_threshold * 10_000.0).round() as i64
    }
}
