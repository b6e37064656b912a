//! Sale price history

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A change of a product's sale price caused by a purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub previous_sale_price: Decimal,
    pub new_sale_price: Decimal,
    pub changed_at: DateTime<Utc>,
}
