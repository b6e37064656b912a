//! Inventory queries: stock levels, alerts, history and reconciliation

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{DateRange, Kardex, MovementRecord, PriceChangeRecord, StockKey, StockRecord};
use uuid::Uuid;

use super::coordinator::finish;
use super::{MovementJournal, PriceHistoryRecorder, StockLedger};
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx};

/// Read side of the ledger
#[derive(Clone)]
pub struct InventoryService<S: LedgerStore> {
    store: S,
    config: LedgerConfig,
    ledger: StockLedger,
    journal: MovementJournal,
    prices: PriceHistoryRecorder,
}

/// Stored balance compared with its journal
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub key: StockKey,
    pub stored_quantity: Decimal,
    /// `resulting_balance` of the latest entry
    pub journal_balance: Option<Decimal>,
    /// Sum of signed quantities over the whole journal
    pub replayed_balance: Decimal,
    pub movement_count: usize,
    pub consistent: bool,
}

impl ReconciliationReport {
    fn build(record: &StockRecord, movements: &[MovementRecord]) -> Self {
        let replayed_balance: Decimal = movements.iter().map(MovementRecord::signed_quantity).sum();
        let journal_balance = movements.last().map(|m| m.resulting_balance);

        let mut running = Decimal::ZERO;
        let snapshots_match = movements.iter().all(|m| {
            running += m.signed_quantity();
            m.resulting_balance == running
        });

        let consistent = snapshots_match
            && replayed_balance == record.quantity
            && journal_balance.unwrap_or(Decimal::ZERO) == record.quantity;

        Self {
            key: record.key(),
            stored_quantity: record.quantity,
            journal_balance,
            replayed_balance,
            movement_count: movements.len(),
            consistent,
        }
    }
}

impl<S: LedgerStore> InventoryService<S> {
    /// Create a new InventoryService instance
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            ledger: StockLedger::new(),
            journal: MovementJournal::new(),
            prices: PriceHistoryRecorder::new(),
        }
    }

    async fn begin(&self) -> AppResult<S::Tx> {
        self.store.begin().await.map_err(|e| e.surface("inventory.begin"))
    }

    /// Current balance of one product in one warehouse
    pub async fn stock(&self, key: StockKey) -> AppResult<StockRecord> {
        let mut tx = self.begin().await?;
        let result = self.ledger.peek(&mut tx, key).await;
        finish(tx, result, "inventory.stock").await
    }

    /// Every balance, optionally for one warehouse
    pub async fn stock_levels(&self, warehouse_id: Option<Uuid>) -> AppResult<Vec<StockRecord>> {
        let mut tx = self.begin().await?;
        let result = tx.list_stock(warehouse_id).await;
        finish(tx, result, "inventory.levels").await
    }

    /// Balances above zero but below the threshold, lowest first
    pub async fn low_stock(&self, threshold: Option<Decimal>) -> AppResult<Vec<StockRecord>> {
        let threshold = threshold.unwrap_or(self.config.low_stock_threshold);
        let mut records: Vec<StockRecord> = self
            .stock_levels(None)
            .await?
            .into_iter()
            .filter(|r| r.is_low(threshold))
            .collect();
        records.sort_by(|a, b| a.quantity.cmp(&b.quantity));
        Ok(records)
    }

    /// Balances expiring between `today` and `today + days`, soonest first
    pub async fn expiring_within(
        &self,
        today: NaiveDate,
        days: Option<i64>,
    ) -> AppResult<Vec<StockRecord>> {
        let days = days.unwrap_or(self.config.expiry_window_days);
        let until = Duration::try_days(days)
            .and_then(|window| today.checked_add_signed(window))
            .ok_or_else(|| AppError::validation("days", "Expiry window is out of range"))?;
        let mut records: Vec<StockRecord> = self
            .stock_levels(None)
            .await?
            .into_iter()
            .filter(|r| r.expires_between(today, until))
            .collect();
        records.sort_by_key(|r| r.expiration_date);
        Ok(records)
    }

    /// Change the expiration date of an existing balance
    pub async fn set_expiration(
        &self,
        key: StockKey,
        expiration_date: Option<NaiveDate>,
    ) -> AppResult<StockRecord> {
        let mut tx = self.begin().await?;
        let result = self.ledger.set_expiration(&mut tx, key, expiration_date).await;
        if result.is_ok() {
            tracing::info!(%key, ?expiration_date, "expiration date changed");
        }
        finish(tx, result, "inventory.set_expiration").await
    }

    pub async fn movements(
        &self,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let mut tx = self.begin().await?;
        let result = self.journal.history(&mut tx, key, range).await;
        finish(tx, result, "inventory.movements").await
    }

    /// Every product's movements in one warehouse, in journal order
    pub async fn warehouse_movements(
        &self,
        warehouse_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        let mut tx = self.begin().await?;
        let result = self.warehouse_movements_in(&mut tx, warehouse_id, range).await;
        finish(tx, result, "inventory.warehouse_movements").await
    }

    async fn warehouse_movements_in(
        &self,
        tx: &mut S::Tx,
        warehouse_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        if tx.warehouse(warehouse_id).await?.is_none() {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }
        tx.movements_by_warehouse(warehouse_id, range).await
    }

    /// The `limit` most recent movements of a warehouse, newest first
    pub async fn latest_movements(
        &self,
        warehouse_id: Uuid,
        limit: usize,
    ) -> AppResult<Vec<MovementRecord>> {
        let mut movements = self.warehouse_movements(warehouse_id, None).await?;
        movements.reverse();
        movements.truncate(limit);
        Ok(movements)
    }

    pub async fn kardex(&self, key: StockKey, range: Option<DateRange>) -> AppResult<Kardex> {
        let mut tx = self.begin().await?;
        let result = self.journal.kardex(&mut tx, key, range).await;
        finish(tx, result, "inventory.kardex").await
    }

    pub async fn price_history(&self, product_id: Uuid) -> AppResult<Vec<PriceChangeRecord>> {
        let mut tx = self.begin().await?;
        let result = self.prices.history(&mut tx, product_id).await;
        finish(tx, result, "inventory.price_history").await
    }

    /// Compare one stored balance with its journal
    pub async fn reconcile(&self, key: StockKey) -> AppResult<ReconciliationReport> {
        let mut tx = self.begin().await?;
        let result = self.reconcile_in(&mut tx, key).await;
        finish(tx, result, "inventory.reconcile").await
    }

    async fn reconcile_in(&self, tx: &mut S::Tx, key: StockKey) -> AppResult<ReconciliationReport> {
        let record = self.ledger.peek(tx, key).await?;
        let movements = tx.movements(key, None).await?;
        Ok(ReconciliationReport::build(&record, &movements))
    }

    /// Reconcile every stored balance
    pub async fn reconcile_all(&self) -> AppResult<Vec<ReconciliationReport>> {
        let mut tx = self.begin().await?;
        let result = self.reconcile_all_in(&mut tx).await;
        finish(tx, result, "inventory.reconcile_all").await
    }

    async fn reconcile_all_in(&self, tx: &mut S::Tx) -> AppResult<Vec<ReconciliationReport>> {
        let records = tx.list_stock(None).await?;
        let mut reports = Vec::with_capacity(records.len());
        for record in &records {
            let movements = tx.movements(record.key(), None).await?;
            let report = ReconciliationReport::build(record, &movements);
            if !report.consistent {
                tracing::warn!(key = %report.key, stored = %report.stored_quantity, replayed = %report.replayed_balance, "stock does not match journal");
            }
            reports.push(report);
        }
        Ok(reports)
    }
}
