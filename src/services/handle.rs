//! Async facade over the ledger
//!
//! Mutations persist and encrypt synchronously, so the handle runs them on
//! tokio's blocking pool. Reads and subscriptions go straight to the
//! repository since they never touch I/O.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::LedgerPaths;
use crate::crypto::KeyStore;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{BudgetId, Money, TransactionDraft, TransactionId};
use crate::storage::RecordId;

use super::ledger::LedgerRepository;

/// Cloneable async handle to one ledger
#[derive(Clone)]
pub struct LedgerHandle {
    ledger: Arc<LedgerRepository>,
}

async fn blocking<T, F>(op: F) -> LedgerResult<T>
where
    F: FnOnce() -> LedgerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| LedgerError::StorageUnavailable(format!("Ledger worker failed: {}", e)))?
}

impl LedgerHandle {
    pub fn new(ledger: Arc<LedgerRepository>) -> Self {
        Self { ledger }
    }

    /// Open (and decrypt) the ledger under `paths` off the caller's thread
    pub async fn open_in(
        paths: LedgerPaths,
        key_store: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let ledger = blocking(move || LedgerRepository::open_in(&paths, key_store, clock)).await?;
        Ok(Self::new(Arc::new(ledger)))
    }

    /// The underlying repository, for snapshot reads and subscriptions
    pub fn ledger(&self) -> &Arc<LedgerRepository> {
        &self.ledger
    }

    async fn run<T, F>(&self, op: F) -> LedgerResult<T>
    where
        F: FnOnce(&LedgerRepository) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        blocking(move || op(&ledger)).await
    }

    pub async fn add_transaction(
        &self,
        draft: TransactionDraft,
        id: Option<TransactionId>,
    ) -> LedgerResult<TransactionId> {
        self.run(move |ledger| ledger.add_transaction(draft, id)).await
    }

    pub async fn delete_transaction(&self, id: TransactionId) -> LedgerResult<()> {
        self.run(move |ledger| ledger.delete_transaction(id)).await
    }

    pub async fn update_transaction(&self, id: TransactionId, draft: TransactionDraft) -> LedgerResult<()> {
        self.run(move |ledger| ledger.update_transaction(id, draft)).await
    }

    pub async fn add_budget(&self, category: String, budget_amount: Money) -> LedgerResult<BudgetId> {
        self.run(move |ledger| ledger.add_budget(category, budget_amount))
            .await
    }

    pub async fn delete_budget(&self, id: BudgetId) -> LedgerResult<()> {
        self.run(move |ledger| ledger.delete_budget(id)).await
    }

    pub async fn update_budget(&self, category: String, limit: Money) -> LedgerResult<()> {
        self.run(move |ledger| ledger.update_budget(&category, limit))
            .await
    }

    pub async fn discard_corrupted(&self, record_id: RecordId) -> LedgerResult<bool> {
        self.run(move |ledger| ledger.discard_corrupted(&record_id))
            .await
    }

    pub async fn refresh(&self) -> LedgerResult<()> {
        self.run(|ledger| ledger.refresh()).await
    }
}
