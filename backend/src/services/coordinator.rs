//! Transaction coordinator
//!
//! Every business operation runs in one transaction: validate references,
//! mutate the ledger, journal the effect, persist the document, commit.
//! Any error rolls the whole operation back. Document-specific operations
//! live in the `purchase`, `transfer`, `sale`, `adjustment` and `import`
//! modules as further `impl` blocks on [`TransactionCoordinator`].

use rust_decimal::Decimal;
use shared::{MovementRecord, Product, StockKey, Warehouse};
use uuid::Uuid;

use super::{MovementJournal, PriceHistoryRecorder, StockLedger};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx, LockMode};

/// Orchestrates ledger, journal and price history into atomic operations
#[derive(Clone)]
pub struct TransactionCoordinator<S: LedgerStore> {
    pub(crate) store: S,
    pub(crate) ledger: StockLedger,
    pub(crate) journal: MovementJournal,
    pub(crate) prices: PriceHistoryRecorder,
}

/// Commit on success; otherwise roll back and surface the error
pub(crate) async fn finish<T: LedgerTx, R>(
    tx: T,
    result: AppResult<R>,
    operation: &str,
) -> AppResult<R> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| e.surface(operation))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(operation, error = ?rollback_err, "rollback failed");
            }
            Err(err.surface(operation))
        }
    }
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: StockLedger::new(),
            journal: MovementJournal::new(),
            prices: PriceHistoryRecorder::new(),
        }
    }

    pub(crate) async fn begin(&self, operation: &str) -> AppResult<S::Tx> {
        self.store.begin().await.map_err(|e| e.surface(operation))
    }

    pub(crate) async fn require_warehouse(
        &self,
        tx: &mut S::Tx,
        id: Uuid,
    ) -> AppResult<Warehouse> {
        tx.warehouse(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
    }

    pub(crate) async fn require_product(&self, tx: &mut S::Tx, id: Uuid) -> AppResult<Product> {
        tx.product(id, LockMode::Read)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub(crate) async fn require_products<I>(&self, tx: &mut S::Tx, ids: I) -> AppResult<()>
    where
        I: IntoIterator<Item = Uuid> + Send,
        I::IntoIter: Send,
    {
        for id in ids {
            self.require_product(tx, id).await?;
        }
        Ok(())
    }

    /// Inflow at an explicit cost
    pub(crate) async fn receive(
        &self,
        tx: &mut S::Tx,
        key: StockKey,
        quantity: Decimal,
        unit_cost: Decimal,
        description: String,
    ) -> AppResult<MovementRecord> {
        let after = self.ledger.increase(tx, key, quantity, unit_cost).await?;
        self.journal
            .record_inflow(tx, &after, quantity, unit_cost, description)
            .await
    }

    /// Outflow at the balance's current average cost
    pub(crate) async fn issue(
        &self,
        tx: &mut S::Tx,
        key: StockKey,
        quantity: Decimal,
        description: String,
    ) -> AppResult<MovementRecord> {
        let after = self.ledger.decrease(tx, key, quantity).await?;
        let cost = after.cost_or_zero();
        self.journal
            .record_outflow(tx, &after, quantity, cost, description)
            .await
    }

    /// Inflow back into an existing balance at its current average cost
    pub(crate) async fn restock(
        &self,
        tx: &mut S::Tx,
        key: StockKey,
        quantity: Decimal,
        description: String,
    ) -> AppResult<MovementRecord> {
        let after = self
            .ledger
            .increase_at_current_cost(tx, key, quantity)
            .await?;
        let cost = after.cost_or_zero();
        self.journal
            .record_inflow(tx, &after, quantity, cost, description)
            .await
    }
}
