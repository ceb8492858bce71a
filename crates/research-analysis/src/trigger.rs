//! Entry points that start runs and read their results
//!
//! [`AnalysisService`] creates the run record and hands the work to a
//! background task. [`ResearchQueries`] reads results straight from the
//! repository and needs no provider credentials.

use crate::error::Result;
use crate::orchestrator::{AnalysisOrchestrator, RunSummary, SymbolOutcome};
use chrono::{NaiveDate, TimeDelta, Utc};
use research_core::{AnalysisReport, Run, Stock, normalize_symbol};
use research_store::{Database, StockDetail};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

/// Background daily run started by [`AnalysisService::trigger_daily_run`]
pub type DailyRunHandle = JoinHandle<Result<RunSummary>>;

/// Background analysis started by [`AnalysisService::trigger_on_demand`]
pub type OnDemandHandle = JoinHandle<Result<SymbolOutcome>>;

/// Starts daily and on-demand runs
#[derive(Clone)]
pub struct AnalysisService {
    orchestrator: AnalysisOrchestrator,
}

impl AnalysisService {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn database(&self) -> &Database {
        self.orchestrator.database()
    }

    /// Create a PENDING run for `run_date` and the configured universe, then
    /// execute it in the background.
    ///
    /// Fails with a duplicate-run error (see
    /// [`AnalysisError::is_duplicate_run`](crate::AnalysisError::is_duplicate_run))
    /// when a PENDING or RUNNING run exists for the same date and universe.
    pub async fn trigger_daily_run(&self, run_date: NaiveDate) -> Result<(Run, DailyRunHandle)> {
        let config = self.database().load_or_create_config().await?;
        let run = self
            .database()
            .create_pending_run(run_date, &config.universe)
            .await?;
        info!(run_id = run.id, %run_date, universe = %run.universe, "Daily run triggered");

        let orchestrator = self.orchestrator.clone();
        let run_id = run.id;
        let handle = tokio::spawn(
            async move { orchestrator.run_daily_analysis(run_id).await }
                .instrument(info_span!("daily_run", run_id)),
        );
        Ok((run, handle))
    }

    /// [`trigger_daily_run`](Self::trigger_daily_run) for today's date in the
    /// configured time zone
    pub async fn trigger_daily_run_today(&self) -> Result<(Run, DailyRunHandle)> {
        let config = self.database().load_or_create_config().await?;
        let tz = config.tz()?;
        let today = Utc::now().with_timezone(&tz).date_naive();
        self.trigger_daily_run(today).await
    }

    /// Analyze one symbol in the background. A stock first seen here is
    /// created untracked.
    pub async fn trigger_on_demand(&self, symbol: &str) -> Result<(Stock, OnDemandHandle)> {
        let symbol = normalize_symbol(symbol)?;
        let stock = self.database().first_or_create_stock(&symbol, false).await?;
        info!(stock_id = stock.id, symbol = %stock.symbol, "On-demand analysis triggered");

        let orchestrator = self.orchestrator.clone();
        let (stock_id, symbol) = (stock.id, stock.symbol.clone());
        let handle = tokio::spawn(async move {
            orchestrator
                .run_on_demand_analysis(stock_id, &symbol)
                .await
        });
        Ok((stock, handle))
    }

    /// Read-only queries over the same database
    pub fn queries(&self) -> ResearchQueries {
        ResearchQueries::new(self.database().clone())
    }
}

/// Read-only queries over runs, reports and stocks
#[derive(Clone)]
pub struct ResearchQueries {
    db: Database,
}

impl ResearchQueries {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recent COMPLETED daily run
    pub async fn latest_completed_run(&self) -> Result<Option<Run>> {
        Ok(self.db.latest_completed_run().await?)
    }

    pub async fn run_by_id(&self, run_id: i64) -> Result<Option<Run>> {
        Ok(self.db.find_run(run_id).await?)
    }

    pub async fn list_runs(&self, limit: i64, offset: i64) -> Result<Vec<Run>> {
        Ok(self.db.list_runs(limit, offset).await?)
    }

    /// Reports of a daily run in rank order
    pub async fn run_reports(&self, run_id: i64) -> Result<Vec<AnalysisReport>> {
        Ok(self.db.reports_for_run(run_id).await?)
    }

    /// Latest report for a symbol; `None` for a symbol never seen
    pub async fn latest_analysis(&self, symbol: &str) -> Result<Option<AnalysisReport>> {
        let symbol = normalize_symbol(symbol)?;
        let Some(stock) = self.db.find_stock_by_symbol(&symbol).await? else {
            return Ok(None);
        };
        Ok(self.db.latest_report_for_stock(stock.id).await?)
    }

    /// Tracked stocks, optionally limited to one sector
    pub async fn list_stocks(
        &self,
        sector: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Stock>> {
        Ok(self.db.list_stocks(sector, limit, offset).await?)
    }

    pub async fn list_sectors(&self) -> Result<Vec<String>> {
        Ok(self.db.list_sectors().await?)
    }

    pub async fn stock_detail(&self, symbol: &str) -> Result<StockDetail> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.db.stock_detail(&symbol).await?)
    }

    /// Non-terminal runs older than `age`, for manual reconciliation
    pub async fn stale_runs(&self, age: TimeDelta) -> Result<Vec<Run>> {
        Ok(self.db.list_stale_runs(Utc::now() - age).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::AnalysisError;
    use crate::providers::{EarningsData, MockMarketDataProvider, MockNewsProvider, Quote};
    use crate::rating::{MockRatingModelProvider, RatingModelProvider, RatingProviderFactory};
    use research_core::{Rating, RunStatus, UNIVERSE_US_LARGE_CAP};
    use std::sync::Arc;

    fn service(db: &Database, market: MockMarketDataProvider) -> AnalysisService {
        let mut news = MockNewsProvider::new();
        news.expect_fetch_news().returning(|_, _| Ok(Vec::new()));

        let mut rater = MockRatingModelProvider::new();
        rater
            .expect_rate()
            .returning(|_| Rating::degraded_unparsed("plain text answer"));
        rater.expect_model_id().returning(|| "gpt-4".to_string());
        let rater: Arc<dyn RatingModelProvider> = Arc::new(rater);
        let ratings: Arc<dyn RatingProviderFactory> = Arc::new(rater);

        AnalysisService::new(AnalysisOrchestrator::new(
            db.clone(),
            Arc::new(market),
            Arc::new(news),
            ratings,
            PipelineConfig::default(),
        ))
    }

    fn quoting_market() -> MockMarketDataProvider {
        let mut market = MockMarketDataProvider::new();
        market.expect_fetch_top_by_market_cap().returning(|_| {
            let mut quote = Quote::new("AAPL", 190.0);
            quote.market_cap = Some(3.0e12);
            Ok(vec![quote])
        });
        market
            .expect_fetch_quote()
            .returning(|symbol| Ok(Some(Quote::new(symbol, 190.0))));
        market
            .expect_fetch_earnings()
            .returning(|_| Ok(EarningsData::default()));
        market.expect_fetch_options().returning(|_| Ok(None));
        market
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_trigger_never_reaches_orchestrator() {
        let db = Database::in_memory().await.unwrap();
        db.create_pending_run(june_first(), UNIVERSE_US_LARGE_CAP)
            .await
            .unwrap();

        let mut market = MockMarketDataProvider::new();
        market.expect_fetch_top_by_market_cap().never();
        let service = service(&db, market);

        let err = service.trigger_daily_run(june_first()).await.unwrap_err();
        assert!(err.is_duplicate_run());
        assert_eq!(service.queries().list_runs(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_daily_run_completes_in_background() {
        let db = Database::in_memory().await.unwrap();
        let service = service(&db, quoting_market());

        let (run, handle) = service.trigger_daily_run(june_first()).await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.universe, UNIVERSE_US_LARGE_CAP);

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.degraded, 1);

        let latest = service.queries().latest_completed_run().await.unwrap().unwrap();
        assert_eq!(latest.id, run.id);
        assert_eq!(service.queries().run_reports(run.id).await.unwrap().len(), 1);

        // A finished run no longer blocks the date
        let (second, handle) = service.trigger_daily_run(june_first()).await.unwrap();
        assert_ne!(second.id, run.id);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_trigger_on_demand_creates_untracked_stock() {
        let db = Database::in_memory().await.unwrap();
        let service = service(&db, quoting_market());

        let (stock, handle) = service.trigger_on_demand(" nvda ").await.unwrap();
        assert_eq!(stock.symbol, "NVDA");
        assert!(!stock.is_tracked);

        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, SymbolOutcome::Analyzed { .. }));

        let report = service.queries().latest_analysis("nvda").await.unwrap().unwrap();
        assert_eq!(report.source_run_id, None);
        assert!(service.queries().list_stocks(None, 50, 0).await.unwrap().is_empty());

        // On-demand anchors are not daily runs
        assert!(service.queries().latest_completed_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queries_for_unknown_or_invalid_symbols() {
        let db = Database::in_memory().await.unwrap();
        let service = service(&db, MockMarketDataProvider::new());

        assert!(service.queries().latest_analysis("MSFT").await.unwrap().is_none());
        assert!(matches!(
            service.queries().latest_analysis("not a ticker").await,
            Err(AnalysisError::Domain(_))
        ));
        assert!(service.trigger_on_demand("").await.is_err());
        assert!(service.queries().run_by_id(42).await.unwrap().is_none());
        assert!(service.queries().stock_detail("MSFT").await.is_err());
    }

    #[tokio::test]
    async fn test_stale_runs_lists_old_pending_runs() {
        let db = Database::in_memory().await.unwrap();
        let run = db
            .create_pending_run(june_first(), UNIVERSE_US_LARGE_CAP)
            .await
            .unwrap();
        let service = service(&db, MockMarketDataProvider::new());

        let stale = service.queries().stale_runs(TimeDelta::hours(6)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, run.id);
        assert_eq!(stale[0].status, RunStatus::Pending);
    }
}
