//! Alpha Vantage API client
//!
//! Quotes combine `GLOBAL_QUOTE` with the `OVERVIEW` fundamentals, earnings
//! combine the `EARNINGS` history with the `EARNINGS_CALENDAR` CSV, and
//! options come from `REALTIME_OPTIONS`.

use super::{SharedRateLimiter, parse_number, rate_limiter};
use crate::cache::QuoteCache;
use crate::config::PipelineConfig;
use crate::error::{AnalysisError, Result};
use crate::providers::{
    EarningsData, EarningsItem, MarketDataProvider, OptionContract, OptionsChain, Quote,
    rank_by_market_cap,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Quarterly reports kept as earnings history
const HISTORY_QUARTERS: usize = 4;

/// Contracts kept on each side of the underlying
const CONTRACTS_PER_SIDE: usize = 3;

/// Preferred days-to-expiry window for option premiums
const PREFERRED_EXPIRY_DAYS: std::ops::RangeInclusive<i64> = 30..=60;

/// Alpha Vantage API client
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    options_api_key: Option<String>,
    base_url: String,
    rate_limiter: SharedRateLimiter,
    quotes: QuoteCache,
    candidates: Vec<String>,
    ranking_concurrency: usize,
}

impl AlphaVantageClient {
    /// Create a new client with default pipeline settings
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            options_api_key: None,
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit),
            quotes: QuoteCache::new(defaults.quote_cache_ttl),
            candidates: defaults.large_cap_candidates,
            ranking_concurrency: defaults.ranking_concurrency,
        }
    }

    /// Create a client using the limits, cache TTL and candidates of `config`
    pub fn from_config(api_key: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            quotes: QuoteCache::new(config.quote_cache_ttl),
            candidates: config.large_cap_candidates.clone(),
            ranking_concurrency: config.ranking_concurrency,
            ..Self::new(api_key, config.market_rate_limit)
        }
    }

    /// Use a separate key for the options endpoint
    pub fn with_options_api_key(mut self, key: impl Into<String>) -> Self {
        self.options_api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send(&self, params: &[(&str, &str)], api_key: &str) -> Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let function = params.first().map_or("", |(_, value)| *value);
        debug!(function, "Alpha Vantage request");

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::RateLimited(PROVIDER));
        }
        if !response.status().is_success() {
            return Err(AnalysisError::provider(
                PROVIDER,
                format!("HTTP error: {}", response.status()),
            ));
        }

        Ok(response)
    }

    async fn get_json(&self, params: &[(&str, &str)], api_key: &str) -> Result<Value> {
        let data: Value = self.send(params, api_key).await?.json().await?;
        check_api_message(&data)?;
        Ok(data)
    }

    async fn get_csv(&self, params: &[(&str, &str)]) -> Result<String> {
        let body = self.send(params, &self.api_key).await?.text().await?;

        // Errors come back as JSON even on CSV endpoints
        if body.trim_start().starts_with('{') {
            let data: Value = serde_json::from_str(&body)?;
            check_api_message(&data)?;
        }
        Ok(body)
    }

    async fn load_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let global = self
            .get_json(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)], &self.api_key)
            .await?;

        if !has_quote(&global) {
            debug!(symbol, "No quote returned");
            return Ok(None);
        }

        // Fundamentals are optional; the quote stands without them
        let overview = match self
            .get_json(&[("function", "OVERVIEW"), ("symbol", symbol)], &self.api_key)
            .await
        {
            Ok(overview) => Some(overview),
            Err(e) => {
                warn!(symbol, error = %e, "Company overview unavailable");
                None
            },
        };

        Ok(parse_quote(symbol, &global, overview.as_ref()))
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        self.quotes
            .get_or_fetch(symbol, || self.load_quote(symbol))
            .await
    }

    async fn fetch_top_by_market_cap(&self, limit: usize) -> Result<Vec<Quote>> {
        let results: Vec<(String, Result<Option<Quote>>)> = stream::iter(self.candidates.clone())
            .map(|symbol| async move {
                let result = self.fetch_quote(&symbol).await;
                (symbol, result)
            })
            .buffer_unordered(self.ranking_concurrency)
            .collect()
            .await;

        let mut quotes = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (symbol, result) in results {
            match result {
                Ok(Some(quote)) => quotes.push(quote),
                Ok(None) => debug!(symbol = %symbol, "Candidate has no quote"),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping candidate");
                    last_error = Some(e);
                },
            }
        }

        // Every candidate failing points at the provider, not the symbols
        if quotes.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(rank_by_market_cap(quotes, limit))
    }

    async fn fetch_earnings(&self, symbol: &str) -> Result<EarningsData> {
        let history = self
            .get_json(&[("function", "EARNINGS"), ("symbol", symbol)], &self.api_key)
            .await?;
        let historical = parse_earnings_history(&history);

        let today = Utc::now().date_naive();
        let upcoming = match self
            .get_csv(&[
                ("function", "EARNINGS_CALENDAR"),
                ("symbol", symbol),
                ("horizon", "3month"),
            ])
            .await
        {
            Ok(csv) => parse_earnings_calendar(&csv, symbol, today)?,
            Err(e) => {
                warn!(symbol, error = %e, "Earnings calendar unavailable");
                Vec::new()
            },
        };

        Ok(EarningsData {
            upcoming,
            historical,
        })
    }

    async fn fetch_options(&self, symbol: &str) -> Result<Option<OptionsChain>> {
        let Some(quote) = self.fetch_quote(symbol).await? else {
            return Ok(None);
        };

        let key = self.options_api_key.as_deref().unwrap_or(&self.api_key);
        let data = self
            .get_json(
                &[
                    ("function", "REALTIME_OPTIONS"),
                    ("symbol", symbol),
                    ("require_greeks", "true"),
                ],
                key,
            )
            .await?;

        Ok(parse_options_chain(&data, quote.price, Utc::now().date_naive()))
    }
}

fn check_api_message(data: &Value) -> Result<()> {
    if let Some(error) = data.get("Error Message") {
        return Err(AnalysisError::provider(
            PROVIDER,
            error.as_str().unwrap_or_default(),
        ));
    }

    if data.get("Note").is_some() {
        return Err(AnalysisError::RateLimited(PROVIDER));
    }

    // Premium-only endpoints and daily caps answer with "Information"
    if let Some(info) = data.get("Information") {
        return Err(AnalysisError::provider(
            PROVIDER,
            info.as_str().unwrap_or_default(),
        ));
    }

    Ok(())
}

fn has_quote(global: &Value) -> bool {
    global
        .get("Global Quote")
        .and_then(Value::as_object)
        .is_some_and(|quote| !quote.is_empty())
}

fn text_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .map(ToString::to_string)
}

fn number_field(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(parse_number)
}

fn date_field(obj: &Value, key: &str) -> Option<NaiveDate> {
    obj.get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Merge a `GLOBAL_QUOTE` answer with an optional `OVERVIEW` answer
pub(crate) fn parse_quote(symbol: &str, global: &Value, overview: Option<&Value>) -> Option<Quote> {
    let gq = global.get("Global Quote")?;
    let price = number_field(gq, "05. price")?;

    let mut quote = Quote::new(symbol, price);
    quote.open_price = number_field(gq, "02. open");
    quote.day_high = number_field(gq, "03. high");
    quote.day_low = number_field(gq, "04. low");
    quote.volume = number_field(gq, "06. volume").map(|v| v as i64);

    // OVERVIEW answers `{}` for symbols it does not cover
    if let Some(ov) = overview.filter(|ov| ov.get("Symbol").is_some()) {
        quote.name = text_field(ov, "Name");
        quote.exchange = text_field(ov, "Exchange");
        quote.sector = text_field(ov, "Sector");
        quote.industry = text_field(ov, "Industry");
        quote.market_cap = number_field(ov, "MarketCapitalization");
        quote.pe_ratio = number_field(ov, "PERatio");
        quote.dividend_yield = number_field(ov, "DividendYield");
        quote.beta = number_field(ov, "Beta");
        quote.high_52w = number_field(ov, "52WeekHigh");
        quote.low_52w = number_field(ov, "52WeekLow");
    }

    Some(quote)
}

/// Most recent quarterly reports from an `EARNINGS` answer
pub(crate) fn parse_earnings_history(data: &Value) -> Vec<EarningsItem> {
    let Some(quarters) = data.get("quarterlyEarnings").and_then(Value::as_array) else {
        return Vec::new();
    };

    quarters
        .iter()
        .filter_map(|q| {
            Some(EarningsItem {
                event_date: date_field(q, "reportedDate")?,
                fiscal_period: text_field(q, "fiscalDateEnding"),
                eps_actual: number_field(q, "reportedEPS"),
                eps_estimate: number_field(q, "estimatedEPS"),
                surprise_percent: number_field(q, "surprisePercentage"),
            })
        })
        .take(HISTORY_QUARTERS)
        .collect()
}

/// Scheduled reports for `symbol` from the `EARNINGS_CALENDAR` CSV
pub(crate) fn parse_earnings_calendar(
    csv_data: &str,
    symbol: &str,
    today: NaiveDate,
) -> Result<Vec<EarningsItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(symbol_col), Some(date_col)) = (column("symbol"), column("reportDate")) else {
        return Ok(Vec::new());
    };
    let fiscal_col = column("fiscalDateEnding");
    let estimate_col = column("estimate");

    let mut upcoming = Vec::new();
    for record in reader.records() {
        let record = record?;
        if !record
            .get(symbol_col)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(symbol))
        {
            continue;
        }

        let Some(event_date) = record
            .get(date_col)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        else {
            continue;
        };
        if event_date < today {
            continue;
        }

        upcoming.push(EarningsItem {
            event_date,
            fiscal_period: fiscal_col
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            eps_actual: None,
            eps_estimate: estimate_col
                .and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<f64>().ok()),
            surprise_percent: None,
        });
    }

    upcoming.sort_by_key(|item| item.event_date);
    Ok(upcoming)
}

/// First expiry 30-60 days out, otherwise the nearest future expiry
pub(crate) fn choose_expiry(expiries: &BTreeSet<NaiveDate>, today: NaiveDate) -> Option<NaiveDate> {
    let mut future = expiries.iter().copied().filter(|d| *d >= today);
    let nearest = future.clone().next()?;

    Some(
        future
            .find(|d| PREFERRED_EXPIRY_DAYS.contains(&(*d - today).num_days()))
            .unwrap_or(nearest),
    )
}

/// Near-the-money chain from a `REALTIME_OPTIONS` answer
pub(crate) fn parse_options_chain(
    data: &Value,
    underlying: f64,
    today: NaiveDate,
) -> Option<OptionsChain> {
    let contracts = data.get("data").and_then(Value::as_array)?;

    let expiries: BTreeSet<NaiveDate> = contracts
        .iter()
        .filter_map(|c| date_field(c, "expiration"))
        .collect();
    let expiry = choose_expiry(&expiries, today)?;

    let mut calls = Vec::new();
    let mut puts = Vec::new();
    for contract in contracts {
        if date_field(contract, "expiration") != Some(expiry) {
            continue;
        }
        let Some(strike) = number_field(contract, "strike") else {
            continue;
        };

        let option = OptionContract {
            strike,
            bid: number_field(contract, "bid").unwrap_or(0.0),
            ask: number_field(contract, "ask").unwrap_or(0.0),
            implied_vol: number_field(contract, "implied_volatility"),
            delta: number_field(contract, "delta"),
        };

        match contract.get("type").and_then(Value::as_str) {
            Some("call") if strike >= underlying => calls.push(option),
            Some("put") if strike <= underlying => puts.push(option),
            _ => {},
        }
    }

    calls.sort_by(|a, b| a.strike.total_cmp(&b.strike));
    calls.truncate(CONTRACTS_PER_SIDE);

    puts.sort_by(|a, b| a.strike.total_cmp(&b.strike));
    let skip = puts.len().saturating_sub(CONTRACTS_PER_SIDE);
    puts.drain(..skip);

    if calls.is_empty() && puts.is_empty() {
        return None;
    }

    Some(OptionsChain {
        underlying_price: underlying,
        expiration_date: expiry,
        days_to_expiry: (expiry - today).num_days(),
        calls,
        puts,
    })
}
