//! Source of "today" for period calculations

use chrono::NaiveDate;
use std::sync::RwLock;

use crate::models::Period;

/// Supplies the current local date to the ledger
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// The reporting period containing today
    fn current_period(&self) -> Period {
        Period::containing(self.today())
    }
}

/// Wall-clock local date
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    today: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: RwLock::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        match self.today.write() {
            Ok(mut guard) => *guard = today,
            Err(poisoned) => *poisoned.into_inner() = today,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.today.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
