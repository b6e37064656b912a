//! Domain models for the inventory ledger

mod adjustment;
mod catalog;
mod movement;
mod pricing;
mod purchase;
mod sale;
mod stock;
mod transfer;

pub use adjustment::*;
pub use catalog::*;
pub use movement::*;
pub use pricing::*;
pub use purchase::*;
pub use sale::*;
pub use stock::*;
pub use transfer::*;
