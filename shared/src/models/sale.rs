//! Sales

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sale out of one warehouse.
///
/// A voided sale has `active == false` and its stock effects reversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    /// Human readable number, `V0001`
    pub code: String,
    pub warehouse_id: Uuid,
    pub seller_id: Uuid,
    pub customer_name: Option<String>,
    pub date: NaiveDate,
    pub lines: Vec<SaleLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub active: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// Average cost of the goods when they left the warehouse
    pub unit_cost: Decimal,
}

impl Sale {
    pub fn is_void(&self) -> bool {
        !self.active
    }

    pub fn line_for(&self, product_id: Uuid) -> Option<&SaleLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}

/// Sale number formatted as stored on the document
pub fn sale_code(number: i64) -> String {
    format!("V{:04}", number)
}
