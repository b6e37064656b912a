//! Kardex: the running-balance view of one stock key's journal
//!
//! The opening balance is derived from the first entry's stored snapshot;
//! every later balance is replayed from signed quantities so a drifted
//! snapshot shows up as a mismatch instead of being copied forward.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::costing::{extended_value, CostError};
use crate::models::{MovementKind, MovementRecord};
use crate::types::StockKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KardexEntry {
    pub movement: MovementRecord,
    /// Balance replayed from the opening balance
    pub running_balance: Decimal,
    /// quantity * unit cost of the movement
    pub value: Decimal,
}

impl KardexEntry {
    pub fn snapshot_matches(&self) -> bool {
        self.movement.resulting_balance == self.running_balance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kardex {
    pub key: StockKey,
    pub opening_balance: Decimal,
    pub entries: Vec<KardexEntry>,
    pub closing_balance: Decimal,
    pub total_inflow_value: Decimal,
    pub total_outflow_value: Decimal,
}

impl Kardex {
    /// Build from movements already sorted in journal order
    pub fn build(key: StockKey, movements: Vec<MovementRecord>) -> Result<Self, CostError> {
        let opening_balance = movements
            .first()
            .map(MovementRecord::balance_before)
            .unwrap_or(Decimal::ZERO);

        let mut running = opening_balance;
        let mut total_inflow_value = Decimal::ZERO;
        let mut total_outflow_value = Decimal::ZERO;
        let mut entries = Vec::with_capacity(movements.len());

        for movement in movements {
            running = running
                .checked_add(movement.signed_quantity())
                .ok_or(CostError::Overflow)?;
            let value = extended_value(movement.quantity, movement.unit_cost)?;
            match movement.kind {
                MovementKind::Inflow => total_inflow_value += value,
                MovementKind::Outflow => total_outflow_value += value,
            }
            entries.push(KardexEntry {
                movement,
                running_balance: running,
                value,
            });
        }

        Ok(Self {
            key,
            opening_balance,
            entries,
            closing_balance: running,
            total_inflow_value,
            total_outflow_value,
        })
    }

    /// True when every stored snapshot agrees with the replayed balance
    pub fn is_consistent(&self) -> bool {
        self.entries.iter().all(KardexEntry::snapshot_matches)
    }
}
