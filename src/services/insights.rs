//! Insight engine
//!
//! Turns a ledger snapshot into a short, prioritized list of textual
//! insights. Evaluation is pure computation over the snapshot; the engine
//! keeps only the previous result so an unchanged list is not re-delivered.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::config::Settings;
use crate::error::LedgerResult;
use crate::events::{Publisher, Subscription};
use crate::models::BudgetStatus;
use crate::reports::LedgerSnapshot;

use super::ledger::{LedgerObserver, LedgerRepository};

/// Upper bound on the number of insights delivered at once
pub const MAX_INSIGHTS: usize = 10;

/// Insight categories, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InsightKind {
    OverBudget,
    NearLimit,
    SpendingTrend,
}

/// One rule-derived statement about the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Compare two budgets by spend ratio without floating point
fn compare_ratio(a: &BudgetStatus, b: &BudgetStatus) -> Ordering {
    let lhs = a.spent_amount.cents() as i128 * b.budget_amount().cents() as i128;
    let rhs = b.spent_amount.cents() as i128 * a.budget_amount().cents() as i128;
    lhs.cmp(&rhs)
}

fn over_budget(snapshot: &LedgerSnapshot) -> Vec<Insight> {
    let mut over: Vec<&BudgetStatus> = snapshot
        .budgets
        .iter()
        .filter(|status| status.is_over_budget())
        .collect();
    over.sort_by(|a, b| {
        b.overspend()
            .cmp(&a.overspend())
            .then_with(|| a.category().cmp(b.category()))
    });
    over.into_iter()
        .map(|status| {
            Insight::new(
                InsightKind::OverBudget,
                format!("{} is over budget by {}", status.category(), status.overspend()),
            )
        })
        .collect()
}

fn near_limit(snapshot: &LedgerSnapshot) -> Vec<Insight> {
    let mut near: Vec<&BudgetStatus> = snapshot
        .budgets
        .iter()
        .filter(|status| status.is_near_limit())
        .collect();
    near.sort_by(|a, b| compare_ratio(b, a).then_with(|| a.category().cmp(b.category())));
    near.into_iter()
        .map(|status| {
            Insight::new(
                InsightKind::NearLimit,
                format!(
                    "{} has used {}% of its budget",
                    status.category(),
                    status.whole_percentage()
                ),
            )
        })
        .collect()
}

/// Spending increase over the prior period, if it exceeds the threshold
fn spending_trend(snapshot: &LedgerSnapshot, threshold_basis_points: i64) -> Option<Insight> {
    let prior = snapshot.prior_period_expenses.cents() as i128;
    if prior <= 0 {
        return None;
    }
    let increase = snapshot.total_expenses.cents() as i128 - prior;
    if increase * 10_000 <= threshold_basis_points as i128 * prior {
        return None;
    }
    Some(Insight::new(
        InsightKind::SpendingTrend,
        format!("Spending is up {}% compared to last month", increase * 100 / prior),
    ))
}

/// Evaluate every rule against a snapshot
///
/// The result is ordered by [`InsightKind`], holds no repeated message and
/// is capped at [`MAX_INSIGHTS`], dropping the least urgent entries.
pub fn evaluate(snapshot: &LedgerSnapshot, threshold_basis_points: i64) -> Vec<Insight> {
    let mut seen = HashSet::new();
    over_budget(snapshot)
        .into_iter()
        .chain(near_limit(snapshot))
        .chain(spending_trend(snapshot, threshold_basis_points))
        .filter(|insight| seen.insert(insight.message.clone()))
        .take(MAX_INSIGHTS)
        .collect()
}

/// Observes the ledger and publishes its insights
pub struct InsightEngine {
    threshold_basis_points: i64,
    current: RwLock<Vec<Insight>>,
    publisher: Publisher<Vec<String>>,
}

impl InsightEngine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            threshold_basis_points: settings.trend_threshold_basis_points(),
            current: RwLock::new(Vec::new()),
            publisher: Publisher::new(Vec::new()),
        }
    }

    /// Create an engine and attach it to `ledger`, evaluating immediately
    pub fn attach_to(ledger: &LedgerRepository) -> LedgerResult<Arc<Self>> {
        let engine = Arc::new(Self::new(ledger.settings()));
        ledger.attach(engine.clone())?;
        Ok(engine)
    }

    /// Recompute insights; returns whether the list changed
    pub fn evaluate_snapshot(&self, snapshot: &LedgerSnapshot) -> bool {
        let insights = evaluate(snapshot, self.threshold_basis_points);
        {
            let mut current = match self.current.write() {
                Ok(current) => current,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *current == insights {
                return false;
            }
            current.clone_from(&insights);
        }

        tracing::debug!(insights = insights.len(), "insights changed");
        self.publisher
            .publish(insights.into_iter().map(|insight| insight.message).collect())
    }

    /// Observe insight messages, most urgent first
    pub fn get_insights(&self) -> Subscription<Vec<String>> {
        self.publisher.subscribe()
    }

    pub fn current_insights(&self) -> Vec<Insight> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LedgerObserver for InsightEngine {
    fn on_snapshot(&self, snapshot: &Arc<LedgerSnapshot>) {
        self.evaluate_snapshot(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Budget, Money, Period, Transaction, TransactionDraft, TransactionId, TransactionKind};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn expense(cents: i64, category: &str, date: NaiveDateTime) -> Transaction {
        Transaction::from_draft(
            TransactionId::new(),
            TransactionDraft::new(TransactionKind::Expense, Money::from_cents(cents), category, date),
        )
    }

    fn snapshot(txns: &[Transaction], budgets: &[Budget]) -> LedgerSnapshot {
        LedgerSnapshot::build(
            Period::monthly(2025, 2).unwrap(),
            txns.iter().enumerate().map(|(i, t)| (i as u64, t)),
            budgets,
            Vec::new(),
        )
    }

    fn budget(category: &str, cents: i64) -> Budget {
        Budget::new(category, Money::from_cents(cents))
    }

    fn messages(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.message.as_str()).collect()
    }

    #[test]
    fn test_over_budget_message() {
        let snap = snapshot(
            &[
                expense(12_000, "Groceries", at(2, 3)),
                expense(9_000, "Groceries", at(2, 4)),
            ],
            &[budget("Groceries", 20_000)],
        );
        let insights = evaluate(&snap, 2000);
        assert_eq!(messages(&insights), vec!["Groceries is over budget by $10.00"]);
        assert_eq!(insights[0].kind, InsightKind::OverBudget);
    }

    #[test]
    fn test_near_limit_band() {
        let snap = snapshot(
            &[
                expense(8_000, "Fuel", at(2, 1)),
                expense(7_999, "Books", at(2, 1)),
                expense(10_000, "Gym", at(2, 1)),
                expense(9_500, "Phone", at(2, 1)),
            ],
            &[
                budget("Fuel", 10_000),
                budget("Books", 10_000),
                budget("Gym", 10_000),
                budget("Phone", 10_000),
            ],
        );
        let insights = evaluate(&snap, 2000);
        // exactly 100% is neither near-limit nor over budget
        assert_eq!(
            messages(&insights),
            vec![
                "Phone has used 95% of its budget",
                "Fuel has used 80% of its budget"
            ]
        );
    }

    #[test]
    fn test_priority_order() {
        let snap = snapshot(
            &[
                expense(9_000, "Fuel", at(2, 1)),
                expense(11_000, "Dining", at(2, 1)),
                expense(30_000, "Rent", at(2, 1)),
                expense(10_000, "Rent", at(1, 1)),
            ],
            &[
                budget("Fuel", 10_000),
                budget("Dining", 10_000),
                budget("Rent", 20_000),
            ],
        );
        let insights = evaluate(&snap, 2000);
        let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::OverBudget,
                InsightKind::OverBudget,
                InsightKind::NearLimit,
                InsightKind::SpendingTrend
            ]
        );
        assert_eq!(insights[0].message, "Rent is over budget by $100.00");
        assert_eq!(insights[3].message, "Spending is up 400% compared to last month");
    }

    #[test]
    fn test_trend_threshold_is_strict() {
        let at_threshold = snapshot(
            &[expense(12_000, "A", at(2, 1)), expense(10_000, "A", at(1, 1))],
            &[],
        );
        assert!(evaluate(&at_threshold, 2000).is_empty());

        let above = snapshot(
            &[expense(12_001, "A", at(2, 1)), expense(10_000, "A", at(1, 1))],
            &[],
        );
        assert_eq!(
            messages(&evaluate(&above, 2000)),
            vec!["Spending is up 20% compared to last month"]
        );
    }

    #[test]
    fn test_no_trend_without_prior_spending() {
        let snap = snapshot(&[expense(50_000, "A", at(2, 1))], &[]);
        assert!(evaluate(&snap, 0).is_empty());
    }

    #[test]
    fn test_capped_at_max() {
        let budgets: Vec<Budget> = (0..15).map(|i| budget(&format!("C{:02}", i), 100)).collect();
        let txns: Vec<Transaction> = (0..15)
            .map(|i| expense(200 + i, &format!("C{:02}", i), at(2, 1)))
            .collect();
        let insights = evaluate(&snapshot(&txns, &budgets), 2000);
        assert_eq!(insights.len(), MAX_INSIGHTS);
        // largest overspend kept first
        assert_eq!(insights[0].message, "C14 is over budget by $1.14");
    }

    #[test]
    fn test_engine_skips_identical_redelivery() {
        let engine = InsightEngine::new(&Settings::default());
        let mut sub = engine.get_insights();
        assert_eq!(sub.try_recv(), Some(Vec::new()));

        let snap = snapshot(
            &[expense(30_000, "Rent", at(2, 1))],
            &[budget("Rent", 20_000)],
        );
        assert!(engine.evaluate_snapshot(&snap));
        assert!(!engine.evaluate_snapshot(&snap));

        assert_eq!(sub.drain().len(), 1);
        assert_eq!(engine.current_insights().len(), 1);
    }
}
