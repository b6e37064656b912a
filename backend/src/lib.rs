//! Inventory valuation and movement ledger
//!
//! Purchases, transfers, sales and manual adjustments mutate per-warehouse
//! stock balances at a weighted-average cost, each mutation journaled, each
//! business operation committed or rolled back as a whole.

pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{InventoryService, TransactionCoordinator};
pub use store::{LedgerStore, LedgerTx, LockMode, MemoryStore, PgStore};
