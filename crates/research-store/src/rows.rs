//! Raw row shapes and their conversion into domain entities

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use research_core::{
    AnalysisReport, EarningsEvent, Filing, NewsArticle, OptionsSnapshot, Run, Snapshot, Stock,
    UserConfig,
};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub(crate) struct StockRow {
    id: i64,
    symbol: String,
    name: String,
    exchange: Option<String>,
    currency: String,
    sector: Option<String>,
    industry: Option<String>,
    is_tracked: bool,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Self {
            id: row.id,
            symbol: row.symbol,
            name: row.name,
            exchange: row.exchange,
            currency: row.currency,
            sector: row.sector,
            industry: row.industry,
            is_tracked: row.is_tracked,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RunRow {
    id: i64,
    run_date: NaiveDate,
    universe: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
}

impl RunRow {
    pub(crate) fn into_run(self) -> Result<Run> {
        Ok(Run {
            id: self.id,
            run_date: self.run_date,
            universe: self.universe,
            status: self.status.parse()?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            notes: self.notes,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SnapshotRow {
    id: i64,
    run_id: i64,
    stock_id: i64,
    sequence: i64,
    market_cap: f64,
    price: f64,
    open_price: f64,
    day_high: f64,
    day_low: f64,
    volume: i64,
    high_52w: f64,
    low_52w: f64,
    pe_ratio: Option<f64>,
    dividend_yield: Option<f64>,
    beta: Option<f64>,
    as_of: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            stock_id: row.stock_id,
            sequence: row.sequence,
            market_cap: row.market_cap,
            price: row.price,
            open_price: row.open_price,
            day_high: row.day_high,
            day_low: row.day_low,
            volume: row.volume,
            high_52w: row.high_52w,
            low_52w: row.low_52w,
            pe_ratio: row.pe_ratio,
            dividend_yield: row.dividend_yield,
            beta: row.beta,
            as_of: row.as_of,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EarningsRow {
    id: i64,
    stock_id: i64,
    source_run_id: Option<i64>,
    event_type: String,
    fiscal_period: Option<String>,
    event_date: NaiveDate,
    eps_actual: Option<f64>,
    eps_estimate: Option<f64>,
    surprise_percent: Option<f64>,
}

impl EarningsRow {
    pub(crate) fn into_event(self) -> Result<EarningsEvent> {
        Ok(EarningsEvent {
            id: self.id,
            stock_id: self.stock_id,
            source_run_id: self.source_run_id,
            event_type: self.event_type.parse()?,
            fiscal_period: self.fiscal_period,
            event_date: self.event_date,
            eps_actual: self.eps_actual,
            eps_estimate: self.eps_estimate,
            surprise_percent: self.surprise_percent,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct NewsRow {
    id: i64,
    stock_id: i64,
    source_run_id: Option<i64>,
    title: String,
    url: String,
    published_at: DateTime<Utc>,
    source: Option<String>,
    summary: Option<String>,
    issue_flag: bool,
}

impl From<NewsRow> for NewsArticle {
    fn from(row: NewsRow) -> Self {
        Self {
            id: row.id,
            stock_id: row.stock_id,
            source_run_id: row.source_run_id,
            title: row.title,
            url: row.url,
            published_at: row.published_at,
            source: row.source,
            summary: row.summary,
            issue_flag: row.issue_flag,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct FilingRow {
    id: i64,
    stock_id: i64,
    source_run_id: Option<i64>,
    filing_type: String,
    period_end: Option<NaiveDate>,
    file_url: String,
    file_date: NaiveDate,
}

impl From<FilingRow> for Filing {
    fn from(row: FilingRow) -> Self {
        Self {
            id: row.id,
            stock_id: row.stock_id,
            source_run_id: row.source_run_id,
            filing_type: row.filing_type,
            period_end: row.period_end,
            file_url: row.file_url,
            file_date: row.file_date,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct OptionsRow {
    id: i64,
    stock_id: i64,
    source_run_id: Option<i64>,
    underlying_price: f64,
    days_to_expiry: i64,
    call_strike: f64,
    call_bid: f64,
    call_implied_vol: Option<f64>,
    call_delta: Option<f64>,
    put_strike: f64,
    put_bid: f64,
    put_implied_vol: Option<f64>,
    put_delta: Option<f64>,
}

impl From<OptionsRow> for OptionsSnapshot {
    fn from(row: OptionsRow) -> Self {
        Self {
            id: row.id,
            stock_id: row.stock_id,
            source_run_id: row.source_run_id,
            underlying_price: row.underlying_price,
            days_to_expiry: row.days_to_expiry,
            call_strike: row.call_strike,
            call_bid: row.call_bid,
            call_implied_vol: row.call_implied_vol,
            call_delta: row.call_delta,
            put_strike: row.put_strike,
            put_bid: row.put_bid,
            put_implied_vol: row.put_implied_vol,
            put_delta: row.put_delta,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ReportRow {
    id: i64,
    stock_id: i64,
    source_run_id: Option<i64>,
    analysis_type: String,
    llm_model: String,
    summary_markdown: String,
    entry_rating: String,
    entry_rationale: String,
    covered_call_rating: String,
    covered_call_rationale: String,
    secured_put_rating: String,
    secured_put_rationale: String,
    risk_flags: String,
    key_dates: String,
    raw_prompt: Option<String>,
    raw_response: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReportRow {
    pub(crate) fn into_report(self) -> Result<AnalysisReport> {
        Ok(AnalysisReport {
            id: self.id,
            stock_id: self.stock_id,
            source_run_id: self.source_run_id,
            analysis_type: self.analysis_type.parse()?,
            model: self.llm_model,
            summary_markdown: self.summary_markdown,
            entry_rating: self.entry_rating.parse()?,
            entry_rationale: self.entry_rationale,
            covered_call_rating: self.covered_call_rating.parse()?,
            covered_call_rationale: self.covered_call_rationale,
            secured_put_rating: self.secured_put_rating.parse()?,
            secured_put_rationale: self.secured_put_rationale,
            risk_flags: serde_json::from_str(&self.risk_flags)?,
            key_dates: serde_json::from_str(&self.key_dates)?,
            raw_prompt: self.raw_prompt,
            raw_response: self.raw_response,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ConfigRow {
    top_n: i64,
    universe: String,
    custom_tickers: String,
    daily_run_time_local: String,
    time_zone: String,
}

impl ConfigRow {
    pub(crate) fn into_config(self) -> Result<UserConfig> {
        let top_n = u32::try_from(self.top_n).map_err(|_| {
            research_core::Error::InvalidConfig(format!("top_n out of range: {}", self.top_n))
        })?;

        Ok(UserConfig {
            top_n,
            universe: self.universe,
            custom_tickers: serde_json::from_str(&self.custom_tickers)?,
            daily_run_time_local: self.daily_run_time_local,
            time_zone: self.time_zone,
        })
    }
}
