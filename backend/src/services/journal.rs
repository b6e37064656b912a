//! Movement journal: the append-only audit trail of stock mutations

use rust_decimal::Decimal;
use shared::{DateRange, Kardex, MovementKind, MovementRecord, NewMovement, StockKey, StockRecord};

use crate::error::AppResult;
use crate::store::LedgerTx;

/// Appends one entry per ledger mutation.
///
/// Callers pass the balance as it stands after the mutation, inside the
/// same transaction, so the snapshot and the balance commit together.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementJournal;

impl MovementJournal {
    pub fn new() -> Self {
        Self
    }

    pub async fn record_inflow<T: LedgerTx>(
        &self,
        tx: &mut T,
        after: &StockRecord,
        quantity: Decimal,
        unit_cost: Decimal,
        description: impl Into<String> + Send,
    ) -> AppResult<MovementRecord> {
        self.append(tx, MovementKind::Inflow, after, quantity, unit_cost, description.into())
            .await
    }

    pub async fn record_outflow<T: LedgerTx>(
        &self,
        tx: &mut T,
        after: &StockRecord,
        quantity: Decimal,
        unit_cost: Decimal,
        description: impl Into<String> + Send,
    ) -> AppResult<MovementRecord> {
        self.append(tx, MovementKind::Outflow, after, quantity, unit_cost, description.into())
            .await
    }

    async fn append<T: LedgerTx>(
        &self,
        tx: &mut T,
        kind: MovementKind,
        after: &StockRecord,
        quantity: Decimal,
        unit_cost: Decimal,
        description: String,
    ) -> AppResult<MovementRecord> {
        let movement = tx
            .append_movement(NewMovement {
                key: after.key(),
                kind,
                quantity,
                unit_cost,
                average_cost: after.cost_or_zero(),
                description,
                resulting_balance: after.quantity,
            })
            .await?;

        tracing::debug!(
            key = %movement.key(),
            kind = movement.kind.as_str(),
            sequence = movement.sequence,
            balance = %movement.resulting_balance,
            "movement recorded"
        );
        Ok(movement)
    }

    /// Entries of one key in journal order, optionally limited to whole days
    pub async fn history<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>> {
        tx.movements(key, range).await
    }

    pub async fn kardex<T: LedgerTx>(
        &self,
        tx: &mut T,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Kardex> {
        let movements = tx.movements(key, range).await?;
        Ok(Kardex::build(key, movements)?)
    }
}
