//! Purchase documents

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Goods received into one warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Purchase price per unit
    pub unit_cost: Decimal,
    pub sale_price: Option<Decimal>,
    pub min_sale_price: Option<Decimal>,
}

impl Purchase {
    pub fn line_for(&self, product_id: Uuid) -> Option<&PurchaseLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}
