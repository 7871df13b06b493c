//! Ledger snapshot
//!
//! An immutable, fully-derived view of the ledger at one commit. Every
//! aggregate (balances, period sums, budget spending) is computed from the
//! canonical records in a single pass, so a snapshot is always internally
//! consistent.

use std::collections::HashMap;

use crate::models::{Budget, BudgetStatus, BudgetSummary, Money, Period, Transaction, TransactionKind};
use crate::storage::RecordId;

/// Consistent read-only state of the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Period the period-scoped figures refer to
    pub period: Period,
    /// All transactions, newest date first; equal dates newest insertion first
    pub transactions: Vec<Transaction>,
    /// Budgets with their current-period spending, ordered by category
    pub budgets: Vec<BudgetStatus>,
    /// All-time income minus all-time expenses; transfers are neutral
    pub total_balance: Money,
    /// EXPENSE total for the current calendar month
    pub monthly_spending: Money,
    pub total_income: Money,
    pub total_expenses: Money,
    /// EXPENSE total for the period before `period`
    pub prior_period_expenses: Money,
    /// Records that failed authentication or decoding at load
    pub corrupted_records: Vec<RecordId>,
}

impl LedgerSnapshot {
    pub fn empty(period: Period) -> Self {
        Self::build(period, std::iter::empty(), std::iter::empty(), Vec::new())
    }

    /// Derive every view from canonical records
    ///
    /// `transactions` yields each record with its insertion sequence number.
    /// All-time INCOME and EXPENSE sums must fit in [`Money`]; every figure
    /// derived here is bounded by one of them.
    pub fn build<'a>(
        period: Period,
        transactions: impl IntoIterator<Item = (u64, &'a Transaction)>,
        budgets: impl IntoIterator<Item = &'a Budget>,
        mut corrupted_records: Vec<RecordId>,
    ) -> Self {
        let prior = period.prev();
        let mut ordered: Vec<(u64, &Transaction)> = transactions.into_iter().collect();

        let mut total_balance = Money::zero();
        let mut total_income = Money::zero();
        let mut total_expenses = Money::zero();
        let mut prior_period_expenses = Money::zero();
        let mut spent_by_category: HashMap<&str, Money> = HashMap::new();

        for (_, txn) in &ordered {
            let day = txn.date.date();
            match txn.kind {
                TransactionKind::Income => {
                    total_balance += txn.amount;
                    if period.contains(day) {
                        total_income += txn.amount;
                    }
                }
                TransactionKind::Expense => {
                    total_balance -= txn.amount;
                    if period.contains(day) {
                        total_expenses += txn.amount;
                        *spent_by_category.entry(txn.category.as_str()).or_default() += txn.amount;
                    } else if prior.contains(day) {
                        prior_period_expenses += txn.amount;
                    }
                }
                TransactionKind::Transfer => {}
            }
        }

        let mut budgets: Vec<BudgetStatus> = budgets
            .into_iter()
            .map(|budget| {
                let spent = spent_by_category
                    .get(budget.category.as_str())
                    .copied()
                    .unwrap_or_default();
                BudgetStatus::new(budget.clone(), spent)
            })
            .collect();
        budgets.sort_by(|a, b| {
            a.category()
                .cmp(b.category())
                .then_with(|| a.budget.id.cmp(&b.budget.id))
        });

        ordered.sort_by(|(seq_a, a), (seq_b, b)| b.date.cmp(&a.date).then_with(|| seq_b.cmp(seq_a)));
        corrupted_records.sort();

        Self {
            period,
            transactions: ordered.into_iter().map(|(_, txn)| txn.clone()).collect(),
            budgets,
            total_balance,
            monthly_spending: total_expenses,
            total_income,
            total_expenses,
            prior_period_expenses,
            corrupted_records,
        }
    }

    /// The `n` most recent transactions
    pub fn recent(&self, n: usize) -> Vec<Transaction> {
        self.transactions.iter().take(n).cloned().collect()
    }

    pub fn budget_for(&self, category: &str) -> Option<&BudgetStatus> {
        self.budgets.iter().find(|status| status.category() == category)
    }

    pub fn is_any_budget_over_limit(&self) -> bool {
        self.budgets.iter().any(BudgetStatus::is_over_budget)
    }

    pub fn budget_summary(&self) -> BudgetSummary {
        BudgetSummary::from_statuses(&self.budgets)
    }
}
