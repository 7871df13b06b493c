//! Budget model
//!
//! A budget is a spending limit for one category over the current period.
//! Only the limit is stored. Spending, remaining amount, percentage and the
//! over-budget flag are derived from the ledger's transactions every time a
//! [`BudgetStatus`] is built, so they cannot drift from their inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::BudgetId;
use super::money::Money;

/// Lower bound (inclusive) of the near-limit band, in percent
pub const NEAR_LIMIT_PERCENT: i64 = 80;

/// A spending limit for a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    /// Matched case-sensitively against `Transaction::category`
    pub category: String,
    /// Limit for the current period; always positive
    pub budget_amount: Money,
}

impl Budget {
    pub fn new(category: impl Into<String>, budget_amount: Money) -> Self {
        Self {
            id: BudgetId::new(),
            category: category.into(),
            budget_amount,
        }
    }

    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        validate_limit(&self.category, self.budget_amount)
    }
}

/// Validate a category/limit pair before it becomes a budget
pub fn validate_limit(category: &str, limit: Money) -> Result<(), BudgetValidationError> {
    if category.trim().is_empty() {
        return Err(BudgetValidationError::EmptyCategory);
    }
    if !limit.is_positive() {
        return Err(BudgetValidationError::NonPositiveLimit(limit));
    }
    Ok(())
}

/// A budget together with its spending in the current period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetStatus {
    pub budget: Budget,
    /// Sum of matching EXPENSE amounts in the current period
    pub spent_amount: Money,
}

impl BudgetStatus {
    pub fn new(budget: Budget, spent_amount: Money) -> Self {
        Self {
            budget,
            spent_amount,
        }
    }

    pub fn category(&self) -> &str {
        &self.budget.category
    }

    pub fn budget_amount(&self) -> Money {
        self.budget.budget_amount
    }

    /// `budget_amount - spent_amount`; negative once overspent
    pub fn remaining_amount(&self) -> Money {
        self.budget.budget_amount - self.spent_amount
    }

    /// How far spending exceeds the limit, zero when within budget
    pub fn overspend(&self) -> Money {
        let remaining = self.remaining_amount();
        if remaining.is_negative() {
            -remaining
        } else {
            Money::zero()
        }
    }

    /// Unclamped spend ratio in percent (may exceed 100)
    pub fn spent_percentage(&self) -> f64 {
        let limit = self.budget.budget_amount.cents();
        if limit <= 0 {
            return 0.0;
        }
        self.spent_amount.cents() as f64 / limit as f64 * 100.0
    }

    /// Spend ratio capped at 100 for progress displays
    pub fn display_percentage(&self) -> f64 {
        self.spent_percentage().min(100.0)
    }

    /// Whole percent, truncated, computed without floating point
    pub fn whole_percentage(&self) -> i64 {
        let limit = self.budget.budget_amount.cents() as i128;
        if limit <= 0 {
            return 0;
        }
        (self.spent_amount.cents() as i128 * 100 / limit) as i64
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent_amount > self.budget.budget_amount
    }

    /// Spending is at least 80% of the limit but still below it
    pub fn is_near_limit(&self) -> bool {
        let spent = self.spent_amount.cents() as i128;
        let limit = self.budget.budget_amount.cents() as i128;
        spent * 100 >= limit * NEAR_LIMIT_PERCENT as i128 && spent < limit
    }
}

/// Budget counts shown alongside the budget list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetSummary {
    pub total: usize,
    pub over_limit: usize,
}

impl BudgetSummary {
    pub fn from_statuses(statuses: &[BudgetStatus]) -> Self {
        Self {
            total: statuses.len(),
            over_limit: statuses.iter().filter(|s| s.is_over_budget()).count(),
        }
    }
}

/// Validation errors for budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    NonPositiveLimit(Money),
    EmptyCategory,
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveLimit(limit) => {
                write!(f, "Budget amount must be greater than zero, got {}", limit)
            }
            Self::EmptyCategory => write!(f, "Budget category cannot be empty"),
        }
    }
}

impl std::error::Error for BudgetValidationError {}
