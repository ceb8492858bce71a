//! Daily and on-demand analysis runs
//!
//! [`AnalysisOrchestrator`] drives either a batch over the configured universe
//! or a single symbol. For each symbol it:
//!
//! 1. Fetches the quote (no quote means the symbol is skipped)
//! 2. Fetches earnings, news and options, each allowed to come back empty
//! 3. Assembles the [`EvaluationPayload`] and asks the rating model for a rating
//! 4. Writes the snapshot, market records and report through one [`SymbolWriter`](research_store::SymbolWriter)
//!
//! A failing symbol never stops a daily batch. Only errors outside the
//! per-symbol loop (configuration, model credential, universe resolution)
//! fail the run.

use crate::config::PipelineConfig;
use crate::error::{AnalysisError, Result, Stage};
use crate::payload::{EvaluationPayload, PayloadSources};
use crate::providers::{
    EarningsData, EarningsItem, MarketDataProvider, NewsItem, NewsProvider, OptionsChain, Quote,
};
use crate::rating::{RatingModelProvider, RatingProviderFactory};
use chrono::Utc;
use research_core::{
    AnalysisType, EventType, NewAnalysisReport, NewEarningsEvent, NewNewsArticle,
    NewOptionsSnapshot, NewSnapshot, Run, Stock, UserConfig, normalize_symbol,
};
use research_store::Database;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Result of analyzing one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// Market records and a report were committed
    Analyzed {
        stock_id: i64,
        report_id: i64,
        /// The stored rating is a fallback
        degraded: bool,
    },
    /// No quote was available; nothing was written
    Skipped { stock_id: i64 },
}

/// Tally of a daily batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    /// Size of the resolved universe
    pub symbols: usize,
    pub analyzed: usize,
    pub skipped: usize,
    /// Reports stored with a fallback rating
    pub degraded: usize,
    /// Symbols whose analysis raised an error
    pub failed: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, outcome: SymbolOutcome) {
        match outcome {
            SymbolOutcome::Analyzed { degraded, .. } => {
                self.analyzed += 1;
                if degraded {
                    self.degraded += 1;
                }
            },
            SymbolOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Which run a symbol is analyzed under, and at what rank
struct Target<'a> {
    run: &'a Run,
    stock: &'a Stock,
    rank: i64,
    analysis_type: AnalysisType,
}

impl Target<'_> {
    /// Batch linkage for market records and reports. On-demand results stand
    /// alone; only their snapshot points at the anchor run.
    fn source_run_id(&self) -> Option<i64> {
        (self.analysis_type == AnalysisType::DailyAuto).then_some(self.run.id)
    }
}

/// Provider data gathered for one symbol
struct Fetched {
    quote: Quote,
    earnings: EarningsData,
    news: Vec<NewsItem>,
    options: Option<OptionsChain>,
}

/// Runs the analysis pipeline against injected providers and storage
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    db: Database,
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
    ratings: Arc<dyn RatingProviderFactory>,
    config: PipelineConfig,
}

impl AnalysisOrchestrator {
    pub fn new(
        db: Database,
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        ratings: Arc<dyn RatingProviderFactory>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            market,
            news,
            ratings,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Execute a PENDING daily run.
    ///
    /// The run ends COMPLETED once every symbol has been attempted, or FAILED
    /// with the cause in its notes when a run-level error occurs. A run that
    /// is not PENDING is rejected untouched.
    pub async fn run_daily_analysis(&self, run_id: i64) -> Result<RunSummary> {
        let run = self.db.mark_run_running(run_id).await?;
        info!(
            run_id,
            run_date = %run.run_date,
            universe = %run.universe,
            "Daily run started"
        );

        let result: Result<RunSummary> = async {
            let summary = self.execute_daily(&run).await?;
            self.db.mark_run_completed(run_id).await?;
            Ok(summary)
        }
        .await;

        match result {
            Ok(summary) => {
                info!(
                    run_id,
                    symbols = summary.symbols,
                    analyzed = summary.analyzed,
                    skipped = summary.skipped,
                    degraded = summary.degraded,
                    failed = summary.failed.len(),
                    "Daily run completed"
                );
                Ok(summary)
            },
            Err(e) => {
                error!(run_id, error = %e, "Daily run failed");
                self.fail_run(run_id, &e).await;
                Err(e)
            },
        }
    }

    /// Analyze one stock under a fresh ON_DEMAND anchor run.
    ///
    /// The stock and the model credential are checked before the anchor is
    /// created, so a rejected request writes nothing. Any later error rolls
    /// back this symbol's writes and is returned; there is no retry.
    pub async fn run_on_demand_analysis(&self, stock_id: i64, symbol: &str) -> Result<SymbolOutcome> {
        let result: Result<SymbolOutcome> = async {
            let stock = self.db.get_stock(stock_id).await?;
            if !stock.symbol.eq_ignore_ascii_case(symbol.trim()) {
                return Err(AnalysisError::SymbolMismatch {
                    stock_id,
                    requested: symbol.to_string(),
                    actual: stock.symbol,
                });
            }

            let rater = self.ratings.create().await?;
            let run = self
                .db
                .create_on_demand_run(Utc::now().date_naive())
                .await?;
            let target = Target {
                run: &run,
                stock: &stock,
                rank: 1,
                analysis_type: AnalysisType::OnDemand,
            };
            self.analyze_symbol(rater.as_ref(), &target)
                .instrument(info_span!("analyze_symbol", run_id = run.id, symbol, rank = 1_i64))
                .await
        }
        .await;

        match &result {
            Ok(outcome) => info!(stock_id, symbol, ?outcome, "On-demand analysis finished"),
            Err(e) => error!(stock_id, symbol, error = %e, "On-demand analysis failed"),
        }
        result
    }

    async fn execute_daily(&self, run: &Run) -> Result<RunSummary> {
        let user_config = self.db.load_or_create_config().await?;
        let rater = self.ratings.create().await?;
        let symbols = self.resolve_universe(&user_config).await?;
        info!(
            run_id = run.id,
            symbols = symbols.len(),
            model = %rater.model_id(),
            "Resolved universe"
        );

        let mut summary = RunSummary {
            run_id: run.id,
            symbols: symbols.len(),
            ..RunSummary::default()
        };

        for (index, symbol) in symbols.iter().enumerate() {
            let rank = i64::try_from(index + 1).unwrap_or(i64::MAX);
            let span = info_span!("analyze_symbol", run_id = run.id, symbol = %symbol, rank);

            let result: Result<SymbolOutcome> = async {
                let stock = self.db.first_or_create_stock(symbol, true).await?;
                let target = Target {
                    run,
                    stock: &stock,
                    rank,
                    analysis_type: AnalysisType::DailyAuto,
                };
                self.analyze_symbol(rater.as_ref(), &target).await
            }
            .instrument(span)
            .await;

            match result {
                Ok(outcome) => summary.record(outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(run_id = run.id, symbol = %symbol, rank, error = %e, "Symbol analysis failed, continuing");
                    summary.failed.push(symbol.clone());
                },
            }
        }

        Ok(summary)
    }

    /// Top `top_n` by market cap, then the custom tickers
    async fn resolve_universe(&self, user_config: &UserConfig) -> Result<Vec<String>> {
        let limit = usize::try_from(user_config.top_n).unwrap_or(usize::MAX);
        let top = call(
            Stage::Quote,
            self.config.universe_timeout,
            self.market.fetch_top_by_market_cap(limit),
        )
        .await?;

        let top: Vec<String> = top.into_iter().map(|quote| quote.symbol).collect();
        debug!(?top, custom = ?user_config.custom_tickers, "Ranked universe candidates");
        Ok(merge_universe(top, &user_config.custom_tickers))
    }

    async fn analyze_symbol(
        &self,
        rater: &dyn RatingModelProvider,
        target: &Target<'_>,
    ) -> Result<SymbolOutcome> {
        let stock_id = target.stock.id;
        let symbol = target.stock.symbol.as_str();

        let quote = call(
            Stage::Quote,
            self.config.provider_timeout,
            self.market.fetch_quote(symbol),
        )
        .await?;
        let Some(quote) = quote else {
            info!(stage = %Stage::Quote, "No quote available, skipping symbol");
            return Ok(SymbolOutcome::Skipped { stock_id });
        };

        let fetched = Fetched {
            quote,
            earnings: self
                .optional(Stage::Earnings, self.market.fetch_earnings(symbol))
                .await
                .unwrap_or_default(),
            news: self
                .optional(
                    Stage::News,
                    self.news.fetch_news(symbol, self.config.news_lookback_days),
                )
                .await
                .unwrap_or_default(),
            options: self
                .optional(Stage::Options, self.market.fetch_options(symbol))
                .await
                .flatten(),
        };

        let filings_limit = i64::try_from(self.config.payload_filings_limit).unwrap_or(i64::MAX);
        let filings = self.db.recent_filings(stock_id, filings_limit).await?;

        let payload = EvaluationPayload::assemble(
            PayloadSources {
                symbol,
                fallback_name: &target.stock.name,
                quote: &fetched.quote,
                earnings: &fetched.earnings,
                news: &fetched.news,
                options: fetched.options.as_ref(),
                filings: &filings,
            },
            self.config.payload_news_limit,
            self.config.payload_filings_limit,
        );

        let rating = rater.rate(&payload).await;
        let degraded = rating.is_degraded();
        if degraded {
            warn!(stage = %Stage::Rating, summary = %rating.summary, "Storing fallback rating");
        }

        let report = NewAnalysisReport {
            stock_id,
            source_run_id: target.source_run_id(),
            analysis_type: target.analysis_type,
            model: rater.model_id(),
            rating,
        };
        let report_id = self.persist(target, &fetched, &report).await?;

        info!(report_id, degraded, "Symbol analyzed");
        Ok(SymbolOutcome::Analyzed {
            stock_id,
            report_id,
            degraded,
        })
    }

    /// Write everything for one symbol in a single transaction
    async fn persist(
        &self,
        target: &Target<'_>,
        fetched: &Fetched,
        report: &NewAnalysisReport,
    ) -> Result<i64> {
        let stock_id = target.stock.id;
        let source_run_id = target.source_run_id();

        // Dropping the writer on any error below rolls the symbol back
        let mut writer = self.db.begin_symbol_write().await?;

        writer
            .update_stock_profile(stock_id, &fetched.quote.profile())
            .await?;
        writer
            .insert_snapshot(&snapshot_from_quote(
                target.run.id,
                stock_id,
                target.rank,
                &fetched.quote,
            ))
            .await?;

        let earnings = [
            (EventType::Upcoming, &fetched.earnings.upcoming),
            (EventType::Historical, &fetched.earnings.historical),
        ];
        for (event_type, items) in earnings {
            for item in items {
                writer
                    .insert_earnings_event(&earnings_event(stock_id, source_run_id, event_type, item))
                    .await?;
            }
        }

        for item in &fetched.news {
            writer
                .insert_news_article(&NewNewsArticle {
                    stock_id,
                    source_run_id,
                    title: item.title.clone(),
                    url: item.url.clone(),
                    published_at: item.published_at,
                    source: item.source.clone(),
                    summary: item.summary.clone(),
                    issue_flag: item.issue_flag,
                })
                .await?;
        }

        match fetched
            .options
            .as_ref()
            .and_then(|chain| options_snapshot(stock_id, source_run_id, chain))
        {
            Some(options) => {
                writer.insert_options_snapshot(&options).await?;
            },
            None if fetched.options.is_some() => {
                debug!(stage = %Stage::Options, "No qualifying call and put, options not stored");
            },
            None => {},
        }

        let report_id = writer.insert_analysis_report(report).await?;

        let writes = writer.writes();
        writer.commit().await?;
        debug!(stage = %Stage::Persist, writes, "Committed symbol write set");
        Ok(report_id)
    }

    /// Secondary provider call: a failure or timeout is logged and yields `None`
    async fn optional<T>(&self, stage: Stage, fut: impl Future<Output = Result<T>>) -> Option<T> {
        match call(stage, self.config.provider_timeout, fut).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Provider call failed, continuing without it");
                None
            },
        }
    }

    async fn fail_run(&self, run_id: i64, cause: &AnalysisError) {
        if let Err(e) = self.db.mark_run_failed(run_id, &cause.to_string()).await {
            error!(run_id, error = %e, "Could not mark run as failed");
        }
    }
}

/// Bound a provider call, mapping an elapsed deadline to [`AnalysisError::Timeout`]
async fn call<T>(
    stage: Stage,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| AnalysisError::Timeout { stage, after })?
}

/// Resolved symbol order: the ranked top list, then custom tickers not
/// already in it. Invalid symbols are dropped.
pub fn merge_universe(top: Vec<String>, custom: &[String]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::with_capacity(top.len() + custom.len());

    for raw in top.iter().chain(custom) {
        match normalize_symbol(raw) {
            Ok(symbol) => {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            },
            Err(e) => warn!(symbol = %raw, error = %e, "Ignoring invalid symbol"),
        }
    }

    symbols
}

/// Snapshot row for a quote; missing range fields fall back to the price
fn snapshot_from_quote(run_id: i64, stock_id: i64, rank: i64, quote: &Quote) -> NewSnapshot {
    let price = quote.price;
    NewSnapshot {
        run_id,
        stock_id,
        sequence: rank,
        market_cap: quote.market_cap.unwrap_or(0.0),
        price,
        open_price: quote.open_price.unwrap_or(price),
        day_high: quote.day_high.unwrap_or(price),
        day_low: quote.day_low.unwrap_or(price),
        volume: quote.volume.unwrap_or(0),
        high_52w: quote.high_52w.unwrap_or(price),
        low_52w: quote.low_52w.unwrap_or(price),
        pe_ratio: quote.pe_ratio,
        dividend_yield: quote.dividend_yield,
        beta: quote.beta,
        as_of: quote.as_of,
    }
}

fn earnings_event(
    stock_id: i64,
    source_run_id: Option<i64>,
    event_type: EventType,
    item: &EarningsItem,
) -> NewEarningsEvent {
    NewEarningsEvent {
        stock_id,
        source_run_id,
        event_type,
        fiscal_period: item.fiscal_period.clone(),
        event_date: item.event_date,
        eps_actual: item.eps_actual,
        eps_estimate: item.eps_estimate,
        surprise_percent: item.surprise_percent,
    }
}

/// Options row for the best call and put; `None` unless both sides qualify
fn options_snapshot(
    stock_id: i64,
    source_run_id: Option<i64>,
    chain: &OptionsChain,
) -> Option<NewOptionsSnapshot> {
    let (call, put) = chain.best_pair()?;
    Some(NewOptionsSnapshot {
        stock_id,
        source_run_id,
        underlying_price: chain.underlying_price,
        days_to_expiry: chain.days_to_expiry,
        call_strike: call.strike,
        call_bid: call.bid,
        call_implied_vol: call.implied_vol,
        call_delta: call.delta,
        put_strike: put.strike,
        put_bid: put.bid,
        put_implied_vol: put.implied_vol,
        put_delta: put.delta,
    })
}
