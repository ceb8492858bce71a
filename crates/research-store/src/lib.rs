//! SQLite repository for stock-research-rs
//!
//! [`Database`] exposes per-entity access for stocks, runs, market records,
//! analysis reports and the singleton configuration and secrets records.
//! Writes belonging to one symbol's analysis go through a [`SymbolWriter`]
//! transaction.

mod db;
pub mod error;
mod records;
mod rows;
mod runs;
mod settings;
mod stocks;
mod writer;

pub use db::Database;
pub use error::{Result, StoreError};
pub use records::StockDetail;
pub use settings::SecretsRecord;
pub use writer::SymbolWriter;
