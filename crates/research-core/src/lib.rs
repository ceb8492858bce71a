//! Core data model for stock-research-rs
//!
//! This crate defines the entities shared by the storage layer and the
//! analysis pipeline:
//!
//! - Stocks and batch runs with their status lifecycle
//! - Point-in-time market records (snapshots, earnings, news, filings, options)
//! - The rating value object produced by the language model
//! - User-editable run configuration and provider credential keys

pub mod entities;
pub mod enums;
pub mod error;
pub mod rating;
pub mod secrets;
pub mod symbol;
pub mod user_config;

pub use entities::{
    AnalysisReport, EarningsEvent, Filing, NewAnalysisReport, NewEarningsEvent, NewFiling,
    NewNewsArticle, NewOptionsSnapshot, NewSnapshot, NewsArticle, OptionsSnapshot, Run,
    Snapshot, Stock, StockProfile,
};
pub use enums::{AnalysisType, EntryRating, EventType, RunStatus, StrategyRating};
pub use error::{Error, Result};
pub use rating::{EntryAssessment, KeyDate, Rating, RiskFlag, StrategyAssessment};
pub use secrets::{ProviderKey, mask_key};
pub use symbol::normalize_symbol;
pub use user_config::{ConfigUpdate, UserConfig};

/// Universe tag used for the daily large-cap batch
pub const UNIVERSE_US_LARGE_CAP: &str = "US_LARGE_CAP";

/// Universe tag of the synthetic runs anchoring on-demand analyses
pub const UNIVERSE_ON_DEMAND: &str = "ON_DEMAND";
