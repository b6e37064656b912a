//! Manual stock corrections

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Increase,
    Decrease,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Increase => "increase",
            AdjustmentKind::Decrease => "decrease",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "increase" => Some(AdjustmentKind::Increase),
            "decrease" => Some(AdjustmentKind::Decrease),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub kind: AdjustmentKind,
    pub quantity: Decimal,
    /// Average cost at the time of the correction
    pub unit_cost: Decimal,
    pub reason: String,
    pub responsible_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
