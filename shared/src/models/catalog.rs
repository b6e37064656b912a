//! Catalog entries the ledger reads but does not own

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical stock location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
}

/// A sellable product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sku: String,
    pub unit_of_measure: Option<String>,
    pub sale_price: Option<Decimal>,
    pub min_sale_price: Option<Decimal>,
    pub active: bool,
}
