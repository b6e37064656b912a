//! Stock balances

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StockKey;

/// Balance and average cost of one product in one warehouse.
///
/// Created on the first inflow and never deleted; a zero quantity is a
/// valid state. `unit_cost` stays `None` until stock is received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub sku: String,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Empty balance for a key that has never held stock
    pub fn empty(key: StockKey, sku: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            warehouse_id: key.warehouse_id,
            product_id: key.product_id,
            quantity: Decimal::ZERO,
            unit_cost: None,
            sku: sku.into(),
            expiration_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }

    /// Current average cost, zero when nothing was ever received
    pub fn cost_or_zero(&self) -> Decimal {
        self.unit_cost.unwrap_or(Decimal::ZERO)
    }

    pub fn is_low(&self, threshold: Decimal) -> bool {
        self.quantity > Decimal::ZERO && self.quantity < threshold
    }

    pub fn expires_between(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.expiration_date
            .is_some_and(|date| date >= from && date <= to)
    }
}
