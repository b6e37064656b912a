//! Ledger services

pub mod adjustment;
pub mod coordinator;
pub mod import;
pub mod inventory;
pub mod journal;
pub mod ledger;
pub mod pricing;
pub mod purchase;
pub mod sale;
pub mod transfer;

pub use adjustment::AdjustmentInput;
pub use coordinator::TransactionCoordinator;
pub use import::{ImportReport, ImportRow, ImportRowError};
pub use inventory::{InventoryService, ReconciliationReport};
pub use journal::MovementJournal;
pub use ledger::StockLedger;
pub use pricing::PriceHistoryRecorder;
pub use purchase::{PurchaseInput, PurchaseLineInput};
pub use sale::{SaleInput, SaleLineInput};
pub use transfer::{TransferInput, TransferLineInput};
