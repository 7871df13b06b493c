//! Ledger repository
//!
//! The authoritative source of transactions and budgets. Canonical records
//! live in an in-memory table guarded by a single writer lock; every
//! mutation is validated, persisted through the [`EncryptedStore`], applied
//! to the table and then published as one new [`LedgerSnapshot`]. Readers
//! clone the current snapshot and never wait on I/O.
//!
//! A failed write leaves both the store and the table untouched, and no
//! subscriber is notified.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::clock::Clock;
use crate::config::{LedgerPaths, Settings};
use crate::crypto::{KeyManager, KeyStore};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{Publisher, Subscription};
use crate::models::{
    validate_limit, Budget, BudgetId, BudgetStatus, BudgetSummary, Money, Transaction,
    TransactionDraft, TransactionId, TransactionKind, TransactionValidationError,
};
use crate::reports::LedgerSnapshot;
use crate::storage::records::{decode, encode};
use crate::storage::{
    BudgetRecord, EncryptedStore, RecordId, RecordKind, TransactionRecord, RECORD_SCHEMA_VERSION,
};

/// Synchronous hook called with every committed snapshot
///
/// Called while the ledger's writer lock is held: implementations may read
/// from the repository but must not mutate it.
pub trait LedgerObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &Arc<LedgerSnapshot>);
}

struct Entry<T> {
    seq: u64,
    value: T,
}

/// All-time INCOME and EXPENSE sums
///
/// Every aggregate in a snapshot is bounded by one of these, so keeping both
/// within the range of [`Money`] keeps snapshot building overflow-free.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Totals {
    income: Money,
    expenses: Money,
}

impl Totals {
    /// Totals with `txn` counted, or `None` if a sum would overflow
    fn with(self, txn: &Transaction) -> Option<Self> {
        let mut next = self;
        match txn.kind {
            TransactionKind::Income => next.income = self.income.checked_add(txn.amount)?,
            TransactionKind::Expense => next.expenses = self.expenses.checked_add(txn.amount)?,
            TransactionKind::Transfer => {}
        }
        Some(next)
    }

    /// Totals with a previously counted `txn` removed
    fn without(self, txn: &Transaction) -> Self {
        // both operands are non-negative, so the difference cannot overflow
        let mut next = self;
        match txn.kind {
            TransactionKind::Income => next.income = self.income - txn.amount,
            TransactionKind::Expense => next.expenses = self.expenses - txn.amount,
            TransactionKind::Transfer => {}
        }
        next
    }

    fn admit(self, txn: &Transaction) -> Result<Self, TransactionValidationError> {
        self.with(txn)
            .ok_or(TransactionValidationError::TotalsOverflow(txn.amount))
    }
}

#[derive(Default)]
struct Canonical {
    transactions: HashMap<TransactionId, Entry<Transaction>>,
    budgets: HashMap<BudgetId, Entry<Budget>>,
    corrupted: Vec<RecordId>,
    totals: Totals,
    next_seq: u64,
}

impl Canonical {
    fn budget_by_category(&self, category: &str) -> Option<&Entry<Budget>> {
        self.budgets
            .values()
            .find(|entry| entry.value.category == category)
    }
}

struct Views {
    transactions: Publisher<Vec<Transaction>>,
    budgets: Publisher<Vec<BudgetStatus>>,
    total_balance: Publisher<Money>,
    monthly_spending: Publisher<Money>,
    total_income: Publisher<Money>,
    total_expenses: Publisher<Money>,
    over_limit: Publisher<bool>,
    /// One publisher per requested window size
    recent: Mutex<HashMap<usize, Publisher<Vec<Transaction>>>>,
}

impl Views {
    fn new(snapshot: &LedgerSnapshot) -> Self {
        Self {
            transactions: Publisher::new(snapshot.transactions.clone()),
            budgets: Publisher::new(snapshot.budgets.clone()),
            total_balance: Publisher::new(snapshot.total_balance),
            monthly_spending: Publisher::new(snapshot.monthly_spending),
            total_income: Publisher::new(snapshot.total_income),
            total_expenses: Publisher::new(snapshot.total_expenses),
            over_limit: Publisher::new(snapshot.is_any_budget_over_limit()),
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn recent_windows(&self) -> MutexGuard<'_, HashMap<usize, Publisher<Vec<Transaction>>>> {
        self.recent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver every view whose value changed; returns how many did
    fn publish(&self, snapshot: &LedgerSnapshot) -> usize {
        let mut changed = [
            self.transactions.publish(snapshot.transactions.clone()),
            self.budgets.publish(snapshot.budgets.clone()),
            self.total_balance.publish(snapshot.total_balance),
            self.monthly_spending.publish(snapshot.monthly_spending),
            self.total_income.publish(snapshot.total_income),
            self.total_expenses.publish(snapshot.total_expenses),
            self.over_limit.publish(snapshot.is_any_budget_over_limit()),
        ]
        .into_iter()
        .filter(|delivered| *delivered)
        .count();

        let mut recent = self.recent_windows();
        recent.retain(|_, publisher| publisher.subscriber_count() > 0);
        for (n, publisher) in recent.iter() {
            if publisher.publish(snapshot.recent(*n)) {
                changed += 1;
            }
        }
        changed
    }
}

/// Encrypted, observable store of transactions and budgets
pub struct LedgerRepository {
    store: Arc<EncryptedStore>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    state: Mutex<Canonical>,
    snapshot: RwLock<Arc<LedgerSnapshot>>,
    views: Views,
    observers: RwLock<Vec<Arc<dyn LedgerObserver>>>,
}

impl LedgerRepository {
    /// Load every record from `store` and build the first snapshot
    ///
    /// Records that fail authentication or decoding are excluded from all
    /// views and listed by [`corrupted_records`](Self::corrupted_records).
    /// Fails only when the key or the storage itself is unavailable.
    pub fn open(
        store: Arc<EncryptedStore>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> LedgerResult<Self> {
        settings.validate()?;
        // Fail closed before touching any record.
        let key = store.key_manager().get_or_create_key()?;

        let canonical = load_canonical(&store)?;
        tracing::info!(
            transactions = canonical.transactions.len(),
            budgets = canonical.budgets.len(),
            corrupted = canonical.corrupted.len(),
            key_version = key.version,
            "ledger opened"
        );

        let snapshot = Arc::new(build_snapshot(&canonical, clock.as_ref()));
        Ok(Self {
            store,
            clock,
            settings,
            views: Views::new(&snapshot),
            state: Mutex::new(canonical),
            snapshot: RwLock::new(snapshot),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Open the ledger stored under `paths`, reading settings from disk
    pub fn open_in(
        paths: &LedgerPaths,
        key_store: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        paths.ensure_directories()?;
        let settings = Settings::load_or_create(paths)?;
        let keys = Arc::new(KeyManager::new(key_store));
        let store = Arc::new(EncryptedStore::open(paths.records_dir(), keys)?);
        Self::open(store, clock, settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn lock_state(&self) -> LedgerResult<MutexGuard<'_, Canonical>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::StorageUnavailable("Ledger state lock poisoned".into()))
    }

    /// Rebuild and publish the snapshot; caller holds the writer lock
    fn commit(&self, state: &Canonical) {
        let snapshot = Arc::new(build_snapshot(state, self.clock.as_ref()));
        match self.snapshot.write() {
            Ok(mut current) => *current = Arc::clone(&snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snapshot),
        }

        let changed = self.views.publish(&snapshot);
        tracing::debug!(views = changed, "ledger views published");

        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for observer in observers {
            observer.on_snapshot(&snapshot);
        }
    }

    /// Register an observer and hand it the current snapshot immediately
    pub fn attach(&self, observer: Arc<dyn LedgerObserver>) -> LedgerResult<()> {
        let _state = self.lock_state()?;
        match self.observers.write() {
            Ok(mut observers) => observers.push(Arc::clone(&observer)),
            Err(poisoned) => poisoned.into_inner().push(Arc::clone(&observer)),
        }
        observer.on_snapshot(&self.snapshot());
        Ok(())
    }

    // --- transactions ---

    /// Validate, persist and publish a new transaction
    ///
    /// A fresh id is assigned unless the caller supplies one.
    pub fn add_transaction(
        &self,
        draft: TransactionDraft,
        id: Option<TransactionId>,
    ) -> LedgerResult<TransactionId> {
        draft.validate()?;

        let mut state = self.lock_state()?;
        let id = id.unwrap_or_else(TransactionId::new);
        let record_id = RecordId::transaction(id);
        if state.transactions.contains_key(&id) || state.corrupted.contains(&record_id) {
            return Err(LedgerError::Duplicate {
                entity_type: "Transaction",
                identifier: id.to_string(),
            });
        }

        let transaction = Transaction::from_draft(id, draft);
        let totals = state.totals.admit(&transaction)?;
        let seq = state.next_seq;
        self.persist_transaction(seq, &transaction)?;

        state.next_seq = seq + 1;
        state.totals = totals;
        state.transactions.insert(
            id,
            Entry {
                seq,
                value: transaction,
            },
        );
        self.commit(&state);
        tracing::debug!(record = %record_id, "transaction added");
        Ok(id)
    }

    /// Delete a transaction by id
    pub fn delete_transaction(&self, id: TransactionId) -> LedgerResult<()> {
        let mut state = self.lock_state()?;
        if !state.transactions.contains_key(&id) {
            return Err(LedgerError::transaction_not_found(id.to_string()));
        }

        let record_id = RecordId::transaction(id);
        self.store.delete(&record_id)?;
        if let Some(entry) = state.transactions.remove(&id) {
            state.totals = state.totals.without(&entry.value);
        }
        self.commit(&state);
        tracing::debug!(record = %record_id, "transaction deleted");
        Ok(())
    }

    /// Replace every field of a transaction except its id and type
    ///
    /// Replacing a record with identical fields writes and publishes nothing.
    pub fn update_transaction(&self, id: TransactionId, draft: TransactionDraft) -> LedgerResult<()> {
        let mut state = self.lock_state()?;
        let entry = state
            .transactions
            .get(&id)
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))?;

        let replacement = entry.value.replaced_with(draft)?;
        if replacement == entry.value {
            return Ok(());
        }

        let totals = state.totals.without(&entry.value).admit(&replacement)?;
        let seq = entry.seq;
        self.persist_transaction(seq, &replacement)?;
        state.totals = totals;
        state.transactions.insert(
            id,
            Entry {
                seq,
                value: replacement,
            },
        );
        self.commit(&state);
        tracing::debug!(record = %RecordId::transaction(id), "transaction updated");
        Ok(())
    }

    fn persist_transaction(&self, seq: u64, transaction: &Transaction) -> LedgerResult<()> {
        let record = TransactionRecord {
            schema_version: RECORD_SCHEMA_VERSION,
            seq,
            transaction: transaction.clone(),
        };
        self.store
            .put(&RecordId::transaction(transaction.id), &encode(&record)?)
    }

    // --- budgets ---

    /// Create a budget for a category that has none yet
    pub fn add_budget(&self, category: impl Into<String>, budget_amount: Money) -> LedgerResult<BudgetId> {
        let category = category.into();
        validate_limit(&category, budget_amount)?;

        let mut state = self.lock_state()?;
        if state.budget_by_category(&category).is_some() {
            return Err(LedgerError::Duplicate {
                entity_type: "Budget",
                identifier: category,
            });
        }

        let budget = Budget::new(category, budget_amount);
        let id = budget.id;
        let seq = state.next_seq;
        self.persist_budget(seq, &budget)?;

        state.next_seq = seq + 1;
        state.budgets.insert(id, Entry { seq, value: budget });
        self.commit(&state);
        tracing::debug!(record = %RecordId::budget(id), "budget added");
        Ok(id)
    }

    pub fn delete_budget(&self, id: BudgetId) -> LedgerResult<()> {
        let mut state = self.lock_state()?;
        if !state.budgets.contains_key(&id) {
            return Err(LedgerError::budget_not_found(id.to_string()));
        }

        let record_id = RecordId::budget(id);
        self.store.delete(&record_id)?;
        state.budgets.remove(&id);
        self.commit(&state);
        tracing::debug!(record = %record_id, "budget deleted");
        Ok(())
    }

    /// Change the limit of the budget for `category`
    pub fn update_budget(&self, category: &str, limit: Money) -> LedgerResult<()> {
        validate_limit(category, limit)?;

        let mut state = self.lock_state()?;
        let entry = state
            .budget_by_category(category)
            .ok_or_else(|| LedgerError::budget_not_found(category))?;
        if entry.value.budget_amount == limit {
            return Ok(());
        }

        let seq = entry.seq;
        let budget = Budget {
            budget_amount: limit,
            ..entry.value.clone()
        };
        self.persist_budget(seq, &budget)?;

        let id = budget.id;
        state.budgets.insert(id, Entry { seq, value: budget });
        self.commit(&state);
        tracing::debug!(record = %RecordId::budget(id), "budget updated");
        Ok(())
    }

    fn persist_budget(&self, seq: u64, budget: &Budget) -> LedgerResult<()> {
        let record = BudgetRecord {
            schema_version: RECORD_SCHEMA_VERSION,
            seq,
            budget: budget.clone(),
        };
        self.store.put(&RecordId::budget(budget.id), &encode(&record)?)
    }

    // --- corrupted records ---

    /// Records excluded from the ledger because they failed authentication
    pub fn corrupted_records(&self) -> Vec<RecordId> {
        self.snapshot().corrupted_records.clone()
    }

    /// Permanently delete a corrupted record; returns whether it was listed
    pub fn discard_corrupted(&self, record_id: &RecordId) -> LedgerResult<bool> {
        let mut state = self.lock_state()?;
        let Some(index) = state.corrupted.iter().position(|id| id == record_id) else {
            return Ok(false);
        };

        self.store.delete(record_id)?;
        state.corrupted.remove(index);
        self.commit(&state);
        tracing::info!(record = %record_id, "corrupted record discarded");
        Ok(true)
    }

    /// Re-derive views against today's period without mutating anything
    ///
    /// Call after the clock crosses into a new month.
    pub fn refresh(&self) -> LedgerResult<()> {
        let state = self.lock_state()?;
        self.commit(&state);
        Ok(())
    }

    // --- snapshot reads ---

    /// The current consistent snapshot
    pub fn snapshot(&self) -> Arc<LedgerSnapshot> {
        match self.snapshot.read() {
            Ok(snapshot) => Arc::clone(&snapshot),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.snapshot().transactions.clone()
    }

    pub fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.snapshot()
            .transactions
            .iter()
            .find(|txn| txn.id == id)
            .cloned()
    }

    pub fn budgets(&self) -> Vec<BudgetStatus> {
        self.snapshot().budgets.clone()
    }

    pub fn budget(&self, category: &str) -> Option<BudgetStatus> {
        self.snapshot().budget_for(category).cloned()
    }

    pub fn total_balance(&self) -> Money {
        self.snapshot().total_balance
    }

    pub fn monthly_spending(&self) -> Money {
        self.snapshot().monthly_spending
    }

    pub fn total_income(&self) -> Money {
        self.snapshot().total_income
    }

    pub fn total_expenses(&self) -> Money {
        self.snapshot().total_expenses
    }

    pub fn recent_transactions(&self, n: usize) -> Vec<Transaction> {
        self.snapshot().recent(n)
    }

    pub fn is_any_budget_over_limit(&self) -> bool {
        self.snapshot().is_any_budget_over_limit()
    }

    pub fn budget_summary(&self) -> BudgetSummary {
        self.snapshot().budget_summary()
    }

    // --- observable views ---

    pub fn get_transactions(&self) -> Subscription<Vec<Transaction>> {
        self.views.transactions.subscribe()
    }

    pub fn get_budgets(&self) -> Subscription<Vec<BudgetStatus>> {
        self.views.budgets.subscribe()
    }

    pub fn get_total_balance(&self) -> Subscription<Money> {
        self.views.total_balance.subscribe()
    }

    pub fn get_monthly_spending(&self) -> Subscription<Money> {
        self.views.monthly_spending.subscribe()
    }

    pub fn get_total_income(&self) -> Subscription<Money> {
        self.views.total_income.subscribe()
    }

    pub fn get_total_expenses(&self) -> Subscription<Money> {
        self.views.total_expenses.subscribe()
    }

    pub fn get_budget_over_limit(&self) -> Subscription<bool> {
        self.views.over_limit.subscribe()
    }

    /// Observe the `n` most recent transactions
    pub fn get_recent_transactions(&self, n: usize) -> Subscription<Vec<Transaction>> {
        let mut recent = self.views.recent_windows();
        recent
            .entry(n)
            .or_insert_with(|| Publisher::new(self.snapshot().recent(n)))
            .subscribe()
    }

    /// Observe recent transactions using the configured window size
    pub fn get_default_recent_transactions(&self) -> Subscription<Vec<Transaction>> {
        self.get_recent_transactions(self.settings.recent_transactions_window)
    }
}

fn build_snapshot(state: &Canonical, clock: &dyn Clock) -> LedgerSnapshot {
    LedgerSnapshot::build(
        clock.current_period(),
        state
            .transactions
            .values()
            .map(|entry| (entry.seq, &entry.value)),
        state.budgets.values().map(|entry| &entry.value),
        state.corrupted.clone(),
    )
}

/// Separate per-record integrity failures from failures of the store itself
fn classify<T>(
    record_id: RecordId,
    result: LedgerResult<T>,
    corrupted: &mut Vec<RecordId>,
) -> LedgerResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_integrity() => {
            tracing::warn!(record = %record_id, error = err.kind(), "skipping corrupted record");
            corrupted.push(record_id);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn load_canonical(store: &EncryptedStore) -> LedgerResult<Canonical> {
    let mut canonical = Canonical::default();
    let mut max_seq = None;
    let mut loaded = Vec::new();

    for entry in store.scan(RecordKind::Transaction)? {
        let entry = entry?;
        let record_id = entry.record_id;
        let Some(bytes) = classify(record_id, entry.value, &mut canonical.corrupted)? else {
            continue;
        };
        let decoded = decode::<TransactionRecord>(&record_id, &bytes).and_then(|record| {
            check_transaction(&record_id, &record)?;
            Ok(record)
        });
        if let Some(record) = classify(record_id, decoded, &mut canonical.corrupted)? {
            loaded.push((record_id, record));
        }
    }

    // Admit in insertion order so the same records are always the ones kept.
    loaded.sort_by_key(|(_, record)| record.seq);
    for (record_id, record) in loaded {
        max_seq = max_seq.max(Some(record.seq));
        let admitted = canonical
            .totals
            .admit(&record.transaction)
            .map_err(|_| LedgerError::Integrity(format!("Record {} overflows ledger totals", record_id)));
        let Some(totals) = classify(record_id, admitted, &mut canonical.corrupted)? else {
            continue;
        };
        canonical.totals = totals;
        canonical.transactions.insert(
            record.transaction.id,
            Entry {
                seq: record.seq,
                value: record.transaction,
            },
        );
    }

    for entry in store.scan(RecordKind::Budget)? {
        let entry = entry?;
        let record_id = entry.record_id;
        let Some(bytes) = classify(record_id, entry.value, &mut canonical.corrupted)? else {
            continue;
        };
        let decoded = decode::<BudgetRecord>(&record_id, &bytes).and_then(|record| {
            check_budget(&record_id, &record)?;
            Ok(record)
        });
        if let Some(record) = classify(record_id, decoded, &mut canonical.corrupted)? {
            max_seq = max_seq.max(Some(record.seq));
            canonical.budgets.insert(
                record.budget.id,
                Entry {
                    seq: record.seq,
                    value: record.budget,
                },
            );
        }
    }

    canonical.next_seq = max_seq.map_or(0, |seq| seq + 1);
    Ok(canonical)
}

fn check_transaction(record_id: &RecordId, record: &TransactionRecord) -> LedgerResult<()> {
    if RecordId::transaction(record.transaction.id) != *record_id {
        return Err(LedgerError::Integrity(format!(
            "Record {} holds a different transaction id",
            record_id
        )));
    }
    record
        .transaction
        .validate()
        .map_err(|_| LedgerError::Integrity(format!("Record {} holds an invalid transaction", record_id)))
}

fn check_budget(record_id: &RecordId, record: &BudgetRecord) -> LedgerResult<()> {
    if RecordId::budget(record.budget.id) != *record_id {
        return Err(LedgerError::Integrity(format!(
            "Record {} holds a different budget id",
            record_id
        )));
    }
    record
        .budget
        .validate()
        .map_err(|_| LedgerError::Integrity(format!("Record {} holds an invalid budget", record_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::crypto::MemoryKeyStore;
    use crate::models::TransactionKind;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn on(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn expense(cents: i64, category: &str) -> TransactionDraft {
        TransactionDraft::new(TransactionKind::Expense, Money::from_cents(cents), category, on(10))
    }

    struct Fixture {
        _temp_dir: TempDir,
        store: Arc<EncryptedStore>,
        clock: Arc<FixedClock>,
        repo: LedgerRepository,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeyStore::generate())));
            let store = Arc::new(EncryptedStore::open(temp_dir.path(), keys).unwrap());
            let clock = Arc::new(FixedClock::new(today()));
            let repo = LedgerRepository::open(store.clone(), clock.clone(), Settings::default()).unwrap();
            Self {
                _temp_dir: temp_dir,
                store,
                clock,
                repo,
            }
        }

        fn reopen(&self) -> LedgerRepository {
            LedgerRepository::open(self.store.clone(), self.clock.clone(), Settings::default()).unwrap()
        }
    }

    #[test]
    fn test_add_and_read_back() {
        let fx = Fixture::new();
        let draft = expense(4_250, "Dining").with_description("Lunch");
        let id = fx.repo.add_transaction(draft.clone(), None).unwrap();

        let stored = fx.repo.transaction(id).unwrap();
        assert_eq!(stored, Transaction::from_draft(id, draft));
        assert_eq!(fx.repo.transactions().len(), 1);
    }

    #[test]
    fn test_add_rejects_invalid_amount() {
        let fx = Fixture::new();
        let err = fx.repo.add_transaction(expense(0, "Dining"), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(fx.store.scan(RecordKind::Transaction).unwrap().count(), 0);
    }

    #[test]
    fn test_add_with_existing_id_is_duplicate() {
        let fx = Fixture::new();
        let id = fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        let err = fx.repo.add_transaction(expense(200, "B"), Some(id)).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(fx.repo.total_expenses(), Money::from_cents(100));
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let fx = Fixture::new();
        let id = fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        let mut draft = expense(100, "A");
        draft.kind = TransactionKind::Income;

        let err = fx.repo.update_transaction(id, draft).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
    }

    #[test]
    fn test_update_and_delete_unknown_id() {
        let fx = Fixture::new();
        let id = TransactionId::new();
        assert!(fx.repo.update_transaction(id, expense(1, "A")).unwrap_err().is_not_found());
        assert!(fx.repo.delete_transaction(id).unwrap_err().is_not_found());
        assert!(fx.repo.delete_budget(BudgetId::new()).unwrap_err().is_not_found());
        assert!(fx.repo.update_budget("Nope", Money::from_cents(1)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_recomputes_budget_in_one_delivery() {
        let fx = Fixture::new();
        fx.repo.add_budget("Groceries", Money::from_cents(10_000)).unwrap();
        let id = fx.repo.add_transaction(expense(5_000, "Groceries"), None).unwrap();

        let mut budgets = fx.repo.get_budgets();
        budgets.drain();

        fx.repo.update_transaction(id, expense(12_000, "Groceries")).unwrap();
        let delivered = budgets.drain();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0][0].is_over_budget());
    }

    #[test]
    fn test_budget_validation_and_uniqueness() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.repo.add_budget("Rent", Money::zero()),
            Err(LedgerError::InvalidBudget(_))
        ));
        fx.repo.add_budget("Rent", Money::from_cents(100_000)).unwrap();
        assert!(matches!(
            fx.repo.add_budget("Rent", Money::from_cents(5)),
            Err(LedgerError::Duplicate { .. })
        ));
        assert!(matches!(
            fx.repo.update_budget("Rent", Money::from_cents(-5)),
            Err(LedgerError::InvalidBudget(_))
        ));

        fx.repo.update_budget("Rent", Money::from_cents(120_000)).unwrap();
        assert_eq!(
            fx.repo.budget("Rent").unwrap().budget_amount(),
            Money::from_cents(120_000)
        );
    }

    #[test]
    fn test_reload_preserves_records_and_order() {
        let fx = Fixture::new();
        let first = fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        let second = fx.repo.add_transaction(expense(200, "B"), None).unwrap();
        let budget = fx.repo.add_budget("A", Money::from_cents(1_000)).unwrap();

        let reopened = fx.reopen();
        let recent = reopened.recent_transactions(2);
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[1].id, first);
        assert_eq!(reopened.budgets()[0].budget.id, budget);

        // new inserts still sort after the reloaded ones
        let third = reopened.add_transaction(expense(300, "C"), None).unwrap();
        assert_eq!(reopened.recent_transactions(1)[0].id, third);
    }

    #[test]
    fn test_corrupted_record_is_listed_and_excluded() {
        let fx = Fixture::new();
        fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        let bad = fx.repo.add_transaction(expense(900, "A"), None).unwrap();
        let bad_record = RecordId::transaction(bad);

        let path = fx
            .store
            .root()
            .join("txn")
            .join(format!("{}.rec", bad_record.id));
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x55;
        std::fs::write(&path, raw).unwrap();

        let reopened = fx.reopen();
        assert_eq!(reopened.corrupted_records(), vec![bad_record]);
        assert_eq!(reopened.total_expenses(), Money::from_cents(100));

        let err = reopened.add_transaction(expense(5, "A"), Some(bad)).unwrap_err();
        assert!(err.is_validation());

        assert!(reopened.discard_corrupted(&bad_record).unwrap());
        assert!(reopened.corrupted_records().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_fails_closed_without_key() {
        struct NoKeys;
        impl KeyStore for NoKeys {
            fn get_or_create(&self) -> LedgerResult<crate::crypto::VersionedKey> {
                Err(LedgerError::KeyUnavailable("locked".into()))
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let keys = Arc::new(KeyManager::new(Arc::new(NoKeys)));
        let store = Arc::new(EncryptedStore::open(temp_dir.path(), keys).unwrap());
        let result = LedgerRepository::open(store, Arc::new(FixedClock::new(today())), Settings::default());
        assert!(matches!(result, Err(LedgerError::KeyUnavailable(_))));
    }

    #[test]
    fn test_failed_write_changes_nothing() {
        let fx = Fixture::new();
        fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        let mut balance = fx.repo.get_total_balance();
        balance.drain();

        // Replace the kind directory with a file so the next put fails.
        let txn_dir = fx.store.root().join("txn");
        let backup = fx.store.root().join("txn-moved");
        std::fs::rename(&txn_dir, &backup).unwrap();
        std::fs::write(&txn_dir, b"not a directory").unwrap();

        let err = fx.repo.add_transaction(expense(500, "B"), None).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(fx.repo.transactions().len(), 1);
        assert_eq!(fx.repo.total_expenses(), Money::from_cents(100));
        assert!(balance.try_recv().is_none());

        std::fs::remove_file(&txn_dir).unwrap();
        std::fs::rename(&backup, &txn_dir).unwrap();
        fx.repo.add_transaction(expense(500, "B"), None).unwrap();
        assert_eq!(fx.repo.total_expenses(), Money::from_cents(600));
    }

    fn income(cents: i64) -> TransactionDraft {
        TransactionDraft::new(TransactionKind::Income, Money::from_cents(cents), "Salary", on(1))
    }

    #[test]
    fn test_totals_overflow_is_rejected_before_write() {
        let fx = Fixture::new();
        fx.repo.add_transaction(income(i64::MAX), None).unwrap();

        let err = fx.repo.add_transaction(income(1), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(fx.store.scan(RecordKind::Transaction).unwrap().count(), 1);

        // still writable, and reopening sees the same totals
        fx.repo.add_transaction(expense(100, "Rent"), None).unwrap();
        assert_eq!(fx.repo.total_balance(), Money::from_cents(i64::MAX - 100));
        let reopened = fx.reopen();
        assert_eq!(reopened.total_income(), Money::from_cents(i64::MAX));
        assert_eq!(reopened.transactions().len(), 2);
    }

    #[test]
    fn test_update_that_overflows_totals_is_rejected() {
        let fx = Fixture::new();
        fx.repo.add_transaction(income(i64::MAX - 10), None).unwrap();
        let id = fx.repo.add_transaction(income(5), None).unwrap();

        let err = fx.repo.update_transaction(id, income(20)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(fx.repo.transaction(id).unwrap().amount, Money::from_cents(5));

        // shrinking the other side frees headroom
        fx.repo.update_transaction(id, income(10)).unwrap();
        assert_eq!(fx.repo.total_income(), Money::from_cents(i64::MAX));
    }

    #[test]
    fn test_loaded_records_past_totals_range_are_corrupted() {
        let fx = Fixture::new();
        let mut ids = Vec::new();
        for (seq, cents) in [(0, i64::MAX), (1, 1)] {
            let transaction = Transaction::from_draft(TransactionId::new(), income(cents));
            let record = TransactionRecord {
                schema_version: RECORD_SCHEMA_VERSION,
                seq,
                transaction: transaction.clone(),
            };
            fx.store
                .put(&RecordId::transaction(transaction.id), &encode(&record).unwrap())
                .unwrap();
            ids.push(transaction.id);
        }

        let repo = fx.reopen();
        assert_eq!(repo.total_income(), Money::from_cents(i64::MAX));
        assert!(repo.transaction(ids[0]).is_some());
        assert_eq!(repo.corrupted_records(), vec![RecordId::transaction(ids[1])]);
    }

    #[test]
    fn test_recent_window_subscription() {
        let fx = Fixture::new();
        let mut recent = fx.repo.get_default_recent_transactions();
        assert_eq!(recent.try_recv(), Some(Vec::new()));

        for i in 0..7 {
            fx.repo.add_transaction(expense(100 + i, "A"), None).unwrap();
        }
        let latest = recent.latest().unwrap();
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0].amount, Money::from_cents(106));
    }

    #[test]
    fn test_refresh_moves_to_new_period() {
        let fx = Fixture::new();
        fx.repo.add_transaction(expense(100, "A"), None).unwrap();
        assert_eq!(fx.repo.monthly_spending(), Money::from_cents(100));

        fx.clock.set(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        fx.repo.refresh().unwrap();
        assert!(fx.repo.monthly_spending().is_zero());
        assert_eq!(fx.repo.snapshot().prior_period_expenses, Money::from_cents(100));
    }

    #[test]
    fn test_observer_sees_every_commit() {
        struct Counter(AtomicUsize);
        impl LedgerObserver for Counter {
            fn on_snapshot(&self, _snapshot: &Arc<LedgerSnapshot>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let fx = Fixture::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        fx.repo.attach(counter.clone()).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        fx.repo.add_budget("A", Money::from_cents(100)).unwrap();
        fx.repo.add_transaction(expense(50, "A"), None).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }
}
