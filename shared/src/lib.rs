//! Shared types and pure logic for the inventory ledger
//!
//! Domain models, the weighted-average cost engine and kardex reconstruction.
//! Nothing in this crate performs I/O.

pub mod costing;
pub mod kardex;
pub mod models;
pub mod types;
pub mod validation;

pub use costing::*;
pub use kardex::*;
pub use models::*;
pub use types::*;
pub use validation::*;
