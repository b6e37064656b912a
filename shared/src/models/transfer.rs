//! Transfers between warehouses

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub origin_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub lines: Vec<TransferLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Origin average cost when the goods left
    pub unit_cost: Decimal,
}
