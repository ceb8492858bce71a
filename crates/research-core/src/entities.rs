//! Persisted entities and their insert forms
//!
//! `source_run_id` is the optional batch linkage. It is set for records written
//! by a daily batch and left empty for on-demand analyses, which are anchored
//! to their own synthetic run only through the snapshot.

use crate::enums::{AnalysisType, EntryRating, EventType, RunStatus, StrategyRating};
use crate::rating::{KeyDate, Rating, RiskFlag};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tradable security, keyed by its uppercase symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    /// Display name; the symbol until a quote supplies the real name
    pub name: String,
    pub exchange: Option<String>,
    pub currency: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    /// Set for symbols discovered by universe selection
    pub is_tracked: bool,
}

/// Descriptive fields refreshed from a successful quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockProfile {
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// One batch (or on-demand anchor) execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub run_date: NaiveDate,
    pub universe: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure cause when the run ended FAILED
    pub notes: Option<String>,
}

/// Point-in-time quote for one stock within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub run_id: i64,
    pub stock_id: i64,
    /// 1-based rank in the run's resolved symbol order
    pub sequence: i64,
    pub market_cap: f64,
    pub price: f64,
    pub open_price: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: i64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub as_of: DateTime<Utc>,
}

/// Insert form of [`Snapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub run_id: i64,
    pub stock_id: i64,
    pub sequence: i64,
    pub market_cap: f64,
    pub price: f64,
    pub open_price: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: i64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub id: i64,
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub event_type: EventType,
    pub fiscal_period: Option<String>,
    pub event_date: NaiveDate,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub surprise_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEarningsEvent {
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub event_type: EventType,
    pub fiscal_period: Option<String>,
    pub event_date: NaiveDate,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub surprise_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: i64,
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: Option<String>,
    pub summary: Option<String>,
    /// Risk-relevant headline (legal, regulatory, distress keywords)
    pub issue_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNewsArticle {
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub issue_flag: bool,
}

/// Regulatory filing reference; ingested outside the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub id: i64,
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    /// Form type such as `10-K` or `10-Q`
    pub filing_type: String,
    pub period_end: Option<NaiveDate>,
    pub file_url: String,
    pub file_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFiling {
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub filing_type: String,
    pub period_end: Option<NaiveDate>,
    pub file_url: String,
    pub file_date: NaiveDate,
}

/// Best covered-call and cash-secured-put candidates for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsSnapshot {
    pub id: i64,
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub underlying_price: f64,
    pub days_to_expiry: i64,
    pub call_strike: f64,
    pub call_bid: f64,
    pub call_implied_vol: Option<f64>,
    pub call_delta: Option<f64>,
    pub put_strike: f64,
    pub put_bid: f64,
    pub put_implied_vol: Option<f64>,
    pub put_delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOptionsSnapshot {
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub underlying_price: f64,
    pub days_to_expiry: i64,
    pub call_strike: f64,
    pub call_bid: f64,
    pub call_implied_vol: Option<f64>,
    pub call_delta: Option<f64>,
    pub put_strike: f64,
    pub put_bid: f64,
    pub put_implied_vol: Option<f64>,
    pub put_delta: Option<f64>,
}

/// The terminal artifact of analyzing one stock. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: i64,
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub analysis_type: AnalysisType,
    /// Model identifier that produced the rating
    pub model: String,
    pub summary_markdown: String,
    pub entry_rating: EntryRating,
    pub entry_rationale: String,
    pub covered_call_rating: StrategyRating,
    pub covered_call_rationale: String,
    pub secured_put_rating: StrategyRating,
    pub secured_put_rationale: String,
    pub risk_flags: Vec<RiskFlag>,
    pub key_dates: Vec<KeyDate>,
    pub raw_prompt: Option<String>,
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysisReport {
    pub stock_id: i64,
    pub source_run_id: Option<i64>,
    pub analysis_type: AnalysisType,
    pub model: String,
    pub rating: Rating,
}
