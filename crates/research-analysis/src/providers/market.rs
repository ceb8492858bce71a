//! Market data contract: quotes, earnings and options chains

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use research_core::StockProfile;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Quote and basic fundamentals for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub price: f64,
    pub open_price: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<i64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub as_of: DateTime<Utc>,
}

impl Quote {
    /// Quote carrying only a price; every optional field empty
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            exchange: None,
            sector: None,
            industry: None,
            market_cap: None,
            price,
            open_price: None,
            day_high: None,
            day_low: None,
            volume: None,
            high_52w: None,
            low_52w: None,
            pe_ratio: None,
            dividend_yield: None,
            beta: None,
            as_of: Utc::now(),
        }
    }

    /// Descriptive fields used to refresh the stock row
    pub fn profile(&self) -> StockProfile {
        StockProfile {
            name: self.name.clone(),
            exchange: self.exchange.clone(),
            sector: self.sector.clone(),
            industry: self.industry.clone(),
        }
    }

    /// Both valuation inputs the model relies on are present
    pub fn has_fundamentals(&self) -> bool {
        self.pe_ratio.is_some() && self.beta.is_some()
    }
}

/// One earnings report, past or scheduled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsItem {
    pub event_date: NaiveDate,
    pub fiscal_period: Option<String>,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub surprise_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarningsData {
    pub upcoming: Vec<EarningsItem>,
    pub historical: Vec<EarningsItem>,
}

impl EarningsData {
    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty() && self.historical.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    pub implied_vol: Option<f64>,
    pub delta: Option<f64>,
}

/// Near-the-money contracts for a single expiry.
///
/// `calls` hold strikes at or above the underlying, `puts` strikes at or
/// below it, both in ascending strike order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub underlying_price: f64,
    pub expiration_date: NaiveDate,
    pub days_to_expiry: i64,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionsChain {
    /// Covered-call and secured-put candidates, when both sides qualify
    pub fn best_pair(&self) -> Option<(&OptionContract, &OptionContract)> {
        let call = select_best_call(&self.calls, self.underlying_price)?;
        let put = select_best_put(&self.puts, self.underlying_price)?;
        Some((call, put))
    }
}

/// Lowest strike at or above the underlying; ties keep the higher bid
pub fn select_best_call(calls: &[OptionContract], underlying: f64) -> Option<&OptionContract> {
    calls
        .iter()
        .filter(|c| c.strike.is_finite() && c.strike >= underlying)
        .min_by(|a, b| by_strike_then_richer_bid(a, b))
}

/// Highest strike at or below the underlying; ties keep the higher bid
pub fn select_best_put(puts: &[OptionContract], underlying: f64) -> Option<&OptionContract> {
    puts.iter()
        .filter(|p| p.strike.is_finite() && p.strike <= underlying)
        .max_by(|a, b| a.strike.total_cmp(&b.strike).then(a.bid.total_cmp(&b.bid)))
}

fn by_strike_then_richer_bid(a: &OptionContract, b: &OptionContract) -> Ordering {
    a.strike.total_cmp(&b.strike).then(b.bid.total_cmp(&a.bid))
}

/// Sort quotes by market cap, largest first, and keep `limit`
pub fn rank_by_market_cap(mut quotes: Vec<Quote>, limit: usize) -> Vec<Quote> {
    quotes.sort_by(|a, b| {
        b.market_cap
            .unwrap_or(0.0)
            .total_cmp(&a.market_cap.unwrap_or(0.0))
    });
    quotes.truncate(limit);
    quotes
}

/// Quotes, fundamentals, earnings calendar and options chains
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Current quote; `None` when the symbol is unknown or delisted
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>>;

    /// Largest names of the configured universe, ordered by market cap
    async fn fetch_top_by_market_cap(&self, limit: usize) -> Result<Vec<Quote>>;

    async fn fetch_earnings(&self, symbol: &str) -> Result<EarningsData>;

    /// Near-the-money chain for the preferred expiry; `None` when no chain is listed
    async fn fetch_options(&self, symbol: &str) -> Result<Option<OptionsChain>>;
}
