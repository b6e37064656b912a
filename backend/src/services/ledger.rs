//! Stock ledger: per-(warehouse, product) balances and average cost

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    validate_amount, validate_quantity, weighted_average, CostError, StockKey, StockRecord,
};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, LockMode};

/// Mutation primitives over stock balances.
///
/// Every mutation locks the balance row for the rest of the transaction.
/// Inflows recompute the average cost; outflows never change it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger;

impl StockLedger {
    pub fn new() -> Self {
        Self
    }

    /// Receive `quantity` units at `unit_cost`, creating the balance on first use
    pub async fn increase<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> AppResult<StockRecord> {
        validate_quantity(quantity).map_err(|m| AppError::validation("quantity", m))?;
        validate_amount(unit_cost).map_err(|m| AppError::validation("unit_cost", m))?;

        let mut record = tx
            .stock_for_inflow(key)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let average = weighted_average(record.quantity, record.unit_cost, quantity, unit_cost)?;
        record.quantity = record
            .quantity
            .checked_add(quantity)
            .ok_or(CostError::Overflow)?;
        record.unit_cost = Some(average);
        record.updated_at = Utc::now();
        tx.save_stock(&record).await?;

        tracing::debug!(%key, %quantity, %unit_cost, balance = %record.quantity, average = %average, "stock increased");
        Ok(record)
    }

    /// Remove `quantity` units; the average cost is left as is
    pub async fn decrease<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        quantity: Decimal,
    ) -> AppResult<StockRecord> {
        validate_quantity(quantity).map_err(|m| AppError::validation("quantity", m))?;

        let mut record = tx
            .stock(key, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock record".to_string()))?;

        if quantity > record.quantity {
            return Err(AppError::InsufficientStock {
                warehouse_id: key.warehouse_id,
                product_id: key.product_id,
                requested: quantity,
                available: record.quantity,
            });
        }

        record.quantity -= quantity;
        record.updated_at = Utc::now();
        tx.save_stock(&record).await?;

        tracing::debug!(%key, %quantity, balance = %record.quantity, "stock decreased");
        Ok(record)
    }

    /// Read without locking
    pub async fn peek<T: LedgerTx>(&self, tx: &mut T, key: StockKey) -> AppResult<StockRecord> {
        tx.stock(key, LockMode::Read)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock record".to_string()))
    }

    /// Return goods to an existing balance at its current average cost
    pub async fn increase_at_current_cost<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        quantity: Decimal,
    ) -> AppResult<StockRecord> {
        let current = tx
            .stock(key, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock record".to_string()))?;

        self.increase(tx, key, quantity, current.cost_or_zero()).await
    }

    pub async fn set_expiration<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        expiration_date: Option<NaiveDate>,
    ) -> AppResult<StockRecord> {
        let mut record = tx
            .stock(key, LockMode::Exclusive)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock record".to_string()))?;

        record.expiration_date = expiration_date;
        record.updated_at = Utc::now();
        tx.save_stock(&record).await?;
        Ok(record)
    }
}
