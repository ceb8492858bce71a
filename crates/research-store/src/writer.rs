//! Per-symbol write set
//!
//! Everything one symbol's analysis persists goes through a [`SymbolWriter`]
//! so the snapshot, earnings, news, options and report rows become visible
//! together or not at all.

use crate::Database;
use crate::error::Result;
use chrono::Utc;
use research_core::{
    NewAnalysisReport, NewEarningsEvent, NewNewsArticle, NewOptionsSnapshot, NewSnapshot,
    StockProfile,
};
use sqlx::{Sqlite, Transaction};

/// Open transaction scoped to one symbol. Dropping it without
/// [`commit`](Self::commit) rolls every write back.
pub struct SymbolWriter {
    tx: Transaction<'static, Sqlite>,
    writes: usize,
}

impl Database {
    /// Start a per-symbol transaction.
    ///
    /// Do not issue other queries on this `Database` from the same task while
    /// the writer is open: an in-memory database has a single connection.
    pub async fn begin_symbol_write(&self) -> Result<SymbolWriter> {
        let tx = self.pool().begin().await?;
        Ok(SymbolWriter { tx, writes: 0 })
    }
}

impl SymbolWriter {
    /// Number of statements executed so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Overwrite descriptive fields that are present in `profile`
    pub async fn update_stock_profile(&mut self, stock_id: i64, profile: &StockProfile) -> Result<()> {
        sqlx::query(
            "UPDATE stocks SET \
               name = COALESCE(?, name), \
               exchange = COALESCE(?, exchange), \
               sector = COALESCE(?, sector), \
               industry = COALESCE(?, industry) \
             WHERE id = ?",
        )
        .bind(profile.name.as_deref())
        .bind(profile.exchange.as_deref())
        .bind(profile.sector.as_deref())
        .bind(profile.industry.as_deref())
        .bind(stock_id)
        .execute(&mut *self.tx)
        .await?;

        self.writes += 1;
        Ok(())
    }

    pub async fn insert_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO stock_snapshots (run_id, stock_id, sequence, market_cap, price, \
               open_price, day_high, day_low, volume, high_52w, low_52w, pe_ratio, \
               dividend_yield, beta, as_of) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.run_id)
        .bind(snapshot.stock_id)
        .bind(snapshot.sequence)
        .bind(snapshot.market_cap)
        .bind(snapshot.price)
        .bind(snapshot.open_price)
        .bind(snapshot.day_high)
        .bind(snapshot.day_low)
        .bind(snapshot.volume)
        .bind(snapshot.high_52w)
        .bind(snapshot.low_52w)
        .bind(snapshot.pe_ratio)
        .bind(snapshot.dividend_yield)
        .bind(snapshot.beta)
        .bind(snapshot.as_of)
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        self.writes += 1;
        Ok(id)
    }

    pub async fn insert_earnings_event(&mut self, event: &NewEarningsEvent) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO earnings_events (stock_id, source_run_id, event_type, fiscal_period, \
               event_date, eps_actual, eps_estimate, surprise_percent) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.stock_id)
        .bind(event.source_run_id)
        .bind(event.event_type.as_str())
        .bind(event.fiscal_period.as_deref())
        .bind(event.event_date)
        .bind(event.eps_actual)
        .bind(event.eps_estimate)
        .bind(event.surprise_percent)
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        self.writes += 1;
        Ok(id)
    }

    pub async fn insert_news_article(&mut self, article: &NewNewsArticle) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO news_articles (stock_id, source_run_id, title, url, published_at, \
               source, summary, issue_flag) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(article.stock_id)
        .bind(article.source_run_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(article.published_at)
        .bind(article.source.as_deref())
        .bind(article.summary.as_deref())
        .bind(article.issue_flag)
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        self.writes += 1;
        Ok(id)
    }

    pub async fn insert_options_snapshot(&mut self, options: &NewOptionsSnapshot) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO options_snapshots (stock_id, source_run_id, underlying_price, \
               days_to_expiry, call_strike, call_bid, call_implied_vol, call_delta, \
               put_strike, put_bid, put_implied_vol, put_delta) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(options.stock_id)
        .bind(options.source_run_id)
        .bind(options.underlying_price)
        .bind(options.days_to_expiry)
        .bind(options.call_strike)
        .bind(options.call_bid)
        .bind(options.call_implied_vol)
        .bind(options.call_delta)
        .bind(options.put_strike)
        .bind(options.put_bid)
        .bind(options.put_implied_vol)
        .bind(options.put_delta)
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        self.writes += 1;
        Ok(id)
    }

    pub async fn insert_analysis_report(&mut self, report: &NewAnalysisReport) -> Result<i64> {
        let rating = &report.rating;
        let risk_flags = serde_json::to_string(&rating.risk_flags)?;
        let key_dates = serde_json::to_string(&rating.key_dates)?;

        let id = sqlx::query(
            "INSERT INTO analysis_reports (stock_id, source_run_id, analysis_type, llm_model, \
               summary_markdown, entry_rating, entry_rationale, covered_call_rating, \
               covered_call_rationale, secured_put_rating, secured_put_rationale, risk_flags, \
               key_dates, raw_prompt, raw_response, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(report.stock_id)
        .bind(report.source_run_id)
        .bind(report.analysis_type.as_str())
        .bind(&report.model)
        .bind(&rating.summary)
        .bind(rating.entry.rating.as_str())
        .bind(&rating.entry.rationale)
        .bind(rating.covered_call.rating.as_str())
        .bind(&rating.covered_call.rationale)
        .bind(rating.secured_put.rating.as_str())
        .bind(&rating.secured_put.rationale)
        .bind(risk_flags)
        .bind(key_dates)
        .bind(rating.prompt.as_deref())
        .bind(rating.raw_response.as_deref())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await?
        .last_insert_rowid();

        self.writes += 1;
        Ok(id)
    }

    /// Make every write visible
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every write explicitly
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use chrono::{NaiveDate, Utc};
    use research_core::{
        AnalysisType, EventType, NewAnalysisReport, NewEarningsEvent, NewFiling, NewNewsArticle,
        NewOptionsSnapshot, NewSnapshot, Rating, StockProfile,
    };

    fn snapshot(run_id: i64, stock_id: i64, sequence: i64) -> NewSnapshot {
        NewSnapshot {
            run_id,
            stock_id,
            sequence,
            market_cap: 3.0e12,
            price: 190.0,
            open_price: 188.0,
            day_high: 191.0,
            day_low: 187.5,
            volume: 50_000_000,
            high_52w: 199.6,
            low_52w: 164.1,
            pe_ratio: Some(29.4),
            dividend_yield: Some(0.005),
            beta: None,
            as_of: Utc::now(),
        }
    }

    fn report(stock_id: i64, run_id: Option<i64>) -> NewAnalysisReport {
        NewAnalysisReport {
            stock_id,
            source_run_id: run_id,
            analysis_type: if run_id.is_some() {
                AnalysisType::DailyAuto
            } else {
                AnalysisType::OnDemand
            },
            model: "gpt-4".to_string(),
            rating: Rating::degraded_unparsed("free text"),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_all_rows_visible() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("AAPL", true).await.unwrap();
        let run = db
            .create_pending_run(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "US_LARGE_CAP")
            .await
            .unwrap();

        let mut writer = db.begin_symbol_write().await.unwrap();
        writer
            .update_stock_profile(
                stock.id,
                &StockProfile {
                    name: Some("Apple Inc.".into()),
                    sector: Some("Technology".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        writer.insert_snapshot(&snapshot(run.id, stock.id, 1)).await.unwrap();
        writer
            .insert_earnings_event(&NewEarningsEvent {
                stock_id: stock.id,
                source_run_id: Some(run.id),
                event_type: EventType::Upcoming,
                fiscal_period: Some("Q3 2024".into()),
                event_date: NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(),
                eps_actual: None,
                eps_estimate: Some(1.35),
                surprise_percent: None,
            })
            .await
            .unwrap();
        writer
            .insert_news_article(&NewNewsArticle {
                stock_id: stock.id,
                source_run_id: Some(run.id),
                title: "Apple faces antitrust investigation".into(),
                url: "https://example.com/a".into(),
                published_at: Utc::now(),
                source: Some("Reuters".into()),
                summary: None,
                issue_flag: true,
            })
            .await
            .unwrap();
        writer
            .insert_options_snapshot(&NewOptionsSnapshot {
                stock_id: stock.id,
                source_run_id: Some(run.id),
                underlying_price: 190.0,
                days_to_expiry: 35,
                call_strike: 195.0,
                call_bid: 2.1,
                call_implied_vol: Some(0.24),
                call_delta: Some(0.35),
                put_strike: 185.0,
                put_bid: 1.9,
                put_implied_vol: Some(0.26),
                put_delta: Some(-0.3),
            })
            .await
            .unwrap();
        writer.insert_analysis_report(&report(stock.id, Some(run.id))).await.unwrap();
        assert_eq!(writer.writes(), 6);
        writer.commit().await.unwrap();

        let detail = db.stock_detail("AAPL").await.unwrap();
        assert_eq!(detail.stock.name, "Apple Inc.");
        assert_eq!(detail.stock.sector.as_deref(), Some("Technology"));
        assert_eq!(detail.recent_news.len(), 1);
        assert!(detail.recent_news[0].issue_flag);
        assert_eq!(detail.latest_options.unwrap().call_strike, 195.0);

        let report = detail.latest_analysis.unwrap();
        assert_eq!(report.summary_markdown, "free text");
        assert_eq!(report.raw_response.as_deref(), Some("free text"));
        assert_eq!(report.source_run_id, Some(run.id));

        assert_eq!(db.snapshots_for_run(run.id).await.unwrap().len(), 1);
        assert_eq!(db.reports_for_run(run.id).await.unwrap().len(), 1);
        let earnings = db.earnings_for_stock(stock.id).await.unwrap();
        assert_eq!(earnings[0].event_type, EventType::Upcoming);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("MSFT", true).await.unwrap();
        let run = db.create_on_demand_run(Utc::now().date_naive()).await.unwrap();

        {
            let mut writer = db.begin_symbol_write().await.unwrap();
            writer.insert_snapshot(&snapshot(run.id, stock.id, 1)).await.unwrap();
            writer.insert_analysis_report(&report(stock.id, None)).await.unwrap();
        }

        assert!(db.snapshots_for_run(run.id).await.unwrap().is_empty());
        assert!(db.latest_report_for_stock(stock.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_snapshot_per_run_and_stock() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("NVDA", true).await.unwrap();
        let run = db.create_on_demand_run(Utc::now().date_naive()).await.unwrap();

        let mut writer = db.begin_symbol_write().await.unwrap();
        writer.insert_snapshot(&snapshot(run.id, stock.id, 1)).await.unwrap();
        let duplicate = writer.insert_snapshot(&snapshot(run.id, stock.id, 2)).await;
        assert!(duplicate.unwrap_err().is_unique_violation());
        writer.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_report_wins_and_filings_are_listed() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("JPM", false).await.unwrap();

        for summary in ["first", "second"] {
            let mut writer = db.begin_symbol_write().await.unwrap();
            let mut new_report = report(stock.id, None);
            new_report.rating.summary = summary.to_string();
            writer.insert_analysis_report(&new_report).await.unwrap();
            writer.commit().await.unwrap();
        }

        let latest = db.latest_report_for_stock(stock.id).await.unwrap().unwrap();
        assert_eq!(latest.summary_markdown, "second");
        assert_eq!(latest.analysis_type, AnalysisType::OnDemand);

        for (day, kind) in [(1, "10-Q"), (20, "10-K")] {
            db.insert_filing(&NewFiling {
                stock_id: stock.id,
                source_run_id: None,
                filing_type: kind.to_string(),
                period_end: None,
                file_url: format!("https://sec.example/{kind}"),
                file_date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            })
            .await
            .unwrap();
        }

        let filings = db.recent_filings(stock.id, 5).await.unwrap();
        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].filing_type, "10-K");
    }
}
