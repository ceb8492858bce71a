//! Read access to market records and analysis reports

use crate::Database;
use crate::error::{Result, StoreError};
use crate::rows::{EarningsRow, FilingRow, NewsRow, OptionsRow, ReportRow, SnapshotRow};
use research_core::{
    AnalysisReport, EarningsEvent, Filing, NewFiling, NewsArticle, OptionsSnapshot, Snapshot,
    Stock,
};
use serde::Serialize;

const REPORT_COLUMNS: &str = "id, stock_id, source_run_id, analysis_type, llm_model, \
     summary_markdown, entry_rating, entry_rationale, covered_call_rating, \
     covered_call_rationale, secured_put_rating, secured_put_rationale, risk_flags, \
     key_dates, raw_prompt, raw_response, created_at";

const OPTIONS_COLUMNS: &str = "id, stock_id, source_run_id, underlying_price, days_to_expiry, \
     call_strike, call_bid, call_implied_vol, call_delta, put_strike, put_bid, \
     put_implied_vol, put_delta";

/// Everything known about one stock, newest first
#[derive(Debug, Clone, Serialize)]
pub struct StockDetail {
    pub stock: Stock,
    pub latest_analysis: Option<AnalysisReport>,
    pub recent_news: Vec<NewsArticle>,
    pub latest_filings: Vec<Filing>,
    pub latest_options: Option<OptionsSnapshot>,
}

impl Database {
    /// Latest report by creation time
    pub async fn latest_report_for_stock(&self, stock_id: i64) -> Result<Option<AnalysisReport>> {
        sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM analysis_reports WHERE stock_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(stock_id)
        .fetch_optional(self.pool())
        .await?
        .map(ReportRow::into_report)
        .transpose()
    }

    /// Reports written by a daily batch, in rank order
    pub async fn reports_for_run(&self, run_id: i64) -> Result<Vec<AnalysisReport>> {
        sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM analysis_reports r WHERE source_run_id = ? \
             ORDER BY (SELECT s.sequence FROM stock_snapshots s \
                       WHERE s.run_id = r.source_run_id AND s.stock_id = r.stock_id), id"
        ))
        .bind(run_id)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(ReportRow::into_report)
        .collect()
    }

    pub async fn snapshots_for_run(&self, run_id: i64) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, run_id, stock_id, sequence, market_cap, price, open_price, day_high, \
               day_low, volume, high_52w, low_52w, pe_ratio, dividend_yield, beta, as_of \
             FROM stock_snapshots WHERE run_id = ? ORDER BY sequence",
        )
        .bind(run_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Snapshot::from).collect())
    }

    pub async fn news_for_stock(&self, stock_id: i64, limit: i64) -> Result<Vec<NewsArticle>> {
        let rows = sqlx::query_as::<_, NewsRow>(
            "SELECT id, stock_id, source_run_id, title, url, published_at, source, summary, \
               issue_flag \
             FROM news_articles WHERE stock_id = ? \
             ORDER BY published_at DESC, id DESC LIMIT ?",
        )
        .bind(stock_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(NewsArticle::from).collect())
    }

    pub async fn earnings_for_stock(&self, stock_id: i64) -> Result<Vec<EarningsEvent>> {
        sqlx::query_as::<_, EarningsRow>(
            "SELECT id, stock_id, source_run_id, event_type, fiscal_period, event_date, \
               eps_actual, eps_estimate, surprise_percent \
             FROM earnings_events WHERE stock_id = ? ORDER BY event_date DESC, id DESC",
        )
        .bind(stock_id)
        .fetch_all(self.pool())
        .await?
        .into_iter()
        .map(EarningsRow::into_event)
        .collect()
    }

    /// Options snapshots for a stock, newest first
    pub async fn options_for_stock(&self, stock_id: i64) -> Result<Vec<OptionsSnapshot>> {
        let rows = sqlx::query_as::<_, OptionsRow>(&format!(
            "SELECT {OPTIONS_COLUMNS} FROM options_snapshots WHERE stock_id = ? ORDER BY id DESC"
        ))
        .bind(stock_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(OptionsSnapshot::from).collect())
    }

    pub async fn recent_filings(&self, stock_id: i64, limit: i64) -> Result<Vec<Filing>> {
        let rows = sqlx::query_as::<_, FilingRow>(
            "SELECT id, stock_id, source_run_id, filing_type, period_end, file_url, file_date \
             FROM filings WHERE stock_id = ? ORDER BY file_date DESC, id DESC LIMIT ?",
        )
        .bind(stock_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Filing::from).collect())
    }

    /// Record a filing found by an ingest path other than the analysis pipeline
    pub async fn insert_filing(&self, filing: &NewFiling) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO filings (stock_id, source_run_id, filing_type, period_end, file_url, \
               file_date) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(filing.stock_id)
        .bind(filing.source_run_id)
        .bind(&filing.filing_type)
        .bind(filing.period_end)
        .bind(&filing.file_url)
        .bind(filing.file_date)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn stock_detail(&self, symbol: &str) -> Result<StockDetail> {
        let stock = self
            .find_stock_by_symbol(symbol)
            .await?
            .ok_or_else(|| StoreError::not_found("stock", symbol))?;

        let latest_analysis = self.latest_report_for_stock(stock.id).await?;
        let recent_news = self.news_for_stock(stock.id, 10).await?;
        let latest_filings = self.recent_filings(stock.id, 5).await?;
        let latest_options = self.options_for_stock(stock.id).await?.into_iter().next();

        Ok(StockDetail {
            stock,
            latest_analysis,
            recent_news,
            latest_filings,
            latest_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use chrono::NaiveDate;
    use research_core::{AnalysisType, NewAnalysisReport, NewFiling, Rating};

    fn filing(stock_id: i64, filing_type: &str, day: u32) -> NewFiling {
        NewFiling {
            stock_id,
            source_run_id: None,
            filing_type: filing_type.to_string(),
            period_end: None,
            file_url: format!("https://www.sec.gov/Archives/{filing_type}-{day}.htm"),
            file_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_recent_filings_newest_first_with_limit() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("AAPL", true).await.unwrap();
        for (day, kind) in [(3, "8-K"), (20, "10-Q"), (11, "4")] {
            db.insert_filing(&filing(stock.id, kind, day)).await.unwrap();
        }

        let filings = db.recent_filings(stock.id, 2).await.unwrap();
        let kinds: Vec<&str> = filings.iter().map(|f| f.filing_type.as_str()).collect();
        assert_eq!(kinds, ["10-Q", "4"]);
    }

    #[tokio::test]
    async fn test_stock_detail_collects_latest_records() {
        let db = Database::in_memory().await.unwrap();
        let stock = db.first_or_create_stock("MSFT", false).await.unwrap();
        db.insert_filing(&filing(stock.id, "10-K", 1)).await.unwrap();

        let mut writer = db.begin_symbol_write().await.unwrap();
        let first = writer
            .insert_analysis_report(&NewAnalysisReport {
                stock_id: stock.id,
                source_run_id: None,
                analysis_type: AnalysisType::OnDemand,
                model: "gpt-4".to_string(),
                rating: Rating::degraded_unparsed("first"),
            })
            .await
            .unwrap();
        let second = writer
            .insert_analysis_report(&NewAnalysisReport {
                stock_id: stock.id,
                source_run_id: None,
                analysis_type: AnalysisType::OnDemand,
                model: "gpt-4".to_string(),
                rating: Rating::degraded_failure("timeout"),
            })
            .await
            .unwrap();
        writer.commit().await.unwrap();
        assert_ne!(first, second);

        let detail = db.stock_detail("MSFT").await.unwrap();
        assert_eq!(detail.stock.id, stock.id);
        assert_eq!(detail.latest_analysis.map(|r| r.id), Some(second));
        assert_eq!(detail.latest_filings.len(), 1);
        assert!(detail.recent_news.is_empty());
        assert!(detail.latest_options.is_none());
    }

    #[tokio::test]
    async fn test_stock_detail_unknown_symbol() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.stock_detail("ZZZQQ").await.is_err());
    }
}
