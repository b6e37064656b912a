//! Transactional persistence for the ledger
//!
//! A `LedgerStore` opens one `LedgerTx` per business operation. Every read and
//! write of that operation goes through the transaction; nothing is visible
//! to other transactions until `commit`, and dropping a transaction without
//! committing discards it.
//!
//! Reads taken with `LockMode::Exclusive` hold the row until the transaction
//! ends, so two writers of the same stock balance or document serialise.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    Adjustment, DateRange, MovementRecord, NewMovement, PriceChangeRecord, Product, Purchase,
    Sale, StockKey, StockRecord, Transfer, Warehouse,
};
use uuid::Uuid;

use crate::error::AppResult;

/// How a row is read inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Plain read, no lock held
    Read,
    /// Row lock held until commit or rollback
    Exclusive,
}

#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    async fn begin(&self) -> AppResult<Self::Tx>;
}

#[async_trait]
pub trait LedgerTx: Send + Sized {
    async fn commit(self) -> AppResult<()>;

    async fn rollback(self) -> AppResult<()>;

    // Catalog

    async fn warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>>;

    async fn product(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Product>>;

    async fn update_product_prices(
        &mut self,
        id: Uuid,
        sale_price: Option<Decimal>,
        min_sale_price: Option<Decimal>,
    ) -> AppResult<()>;

    // Stock balances

    async fn stock(&mut self, key: StockKey, mode: LockMode) -> AppResult<Option<StockRecord>>;

    /// Lock the balance for an inflow, creating an empty record (with the
    /// product's sku) when the key has never held stock. `None` when the
    /// product does not exist.
    async fn stock_for_inflow(&mut self, key: StockKey) -> AppResult<Option<StockRecord>>;

    async fn save_stock(&mut self, record: &StockRecord) -> AppResult<()>;

    async fn list_stock(&mut self, warehouse_id: Option<Uuid>) -> AppResult<Vec<StockRecord>>;

    // Journal

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord>;

    /// Movements of one key in journal order
    async fn movements(
        &mut self,
        key: StockKey,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>>;

    /// Movements of every product held in one warehouse, in journal order
    async fn movements_by_warehouse(
        &mut self,
        warehouse_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<MovementRecord>>;

    // Sale prices

    async fn append_price_change(&mut self, record: &PriceChangeRecord) -> AppResult<()>;

    async fn price_changes(&mut self, product_id: Uuid) -> AppResult<Vec<PriceChangeRecord>>;

    // Documents. `save_*` upserts the header and replaces every line.
    // Listings filter on the document date and run oldest first.

    async fn purchase(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Purchase>>;

    async fn save_purchase(&mut self, purchase: &Purchase) -> AppResult<()>;

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<()>;

    async fn purchases(&mut self, range: Option<DateRange>) -> AppResult<Vec<Purchase>>;

    async fn transfer(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Transfer>>;

    async fn save_transfer(&mut self, transfer: &Transfer) -> AppResult<()>;

    async fn delete_transfer(&mut self, id: Uuid) -> AppResult<()>;

    async fn transfers(&mut self, range: Option<DateRange>) -> AppResult<Vec<Transfer>>;

    async fn sale(&mut self, id: Uuid, mode: LockMode) -> AppResult<Option<Sale>>;

    async fn save_sale(&mut self, sale: &Sale) -> AppResult<()>;

    async fn delete_sale(&mut self, id: Uuid) -> AppResult<()>;

    async fn sales(&mut self, range: Option<DateRange>) -> AppResult<Vec<Sale>>;

    async fn next_sale_number(&mut self) -> AppResult<i64>;

    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> AppResult<()>;

    async fn adjustments(&mut self, key: Option<StockKey>) -> AppResult<Vec<Adjustment>>;
}
