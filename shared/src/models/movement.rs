//! Journal entries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StockKey;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Inflow,
    Outflow,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inflow => "inflow",
            MovementKind::Outflow => "outflow",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inflow" => Some(MovementKind::Inflow),
            "outflow" => Some(MovementKind::Outflow),
            _ => None,
        }
    }
}

/// Immutable record of one stock mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    /// Global append order, breaks ties between equal timestamps
    pub sequence: i64,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    /// Cost attributed to this movement
    pub unit_cost: Decimal,
    /// Average cost of the balance after this movement
    pub average_cost: Decimal,
    pub description: String,
    /// Stock quantity after this movement
    pub resulting_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl MovementRecord {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }

    /// Quantity with sign: positive for inflows
    pub fn signed_quantity(&self) -> Decimal {
        match self.kind {
            MovementKind::Inflow => self.quantity,
            MovementKind::Outflow => -self.quantity,
        }
    }

    /// Balance immediately before this movement was applied
    pub fn balance_before(&self) -> Decimal {
        self.resulting_balance - self.signed_quantity()
    }
}

/// Journal entry waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub key: StockKey,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub average_cost: Decimal,
    pub description: String,
    pub resulting_balance: Decimal,
}
