//! Holdings persistence.
//!
//! The table lives in a single CSV file and is only ever loaded or replaced
//! whole. Every load-mutate-save sequence, whether driven by a tracking tick
//! or an operator command, goes through [`SharedStore`] so the two paths can
//! never overwrite each other's changes.

pub mod book;
pub mod csv_store;
pub mod memory;
pub mod shared;

pub use book::NewHolding;
pub use csv_store::{CsvHoldingsStore, COLUMNS, RESERVED_SYMBOL};
pub use memory::MemoryStore;
pub use shared::{SharedStore, StoreGuard};
