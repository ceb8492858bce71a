//! Evaluation payload sent to the rating model

use crate::providers::{EarningsData, NewsItem, OptionsChain, Quote};
use chrono::{DateTime, NaiveDate, Utc};
use research_core::Filing;
use serde::Serialize;

/// Everything the model sees about one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationPayload {
    pub symbol: String,
    pub name: String,
    pub quote: QuoteSummary,
    pub earnings: EarningsData,
    pub news: Vec<NewsSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filings: Vec<FilingSummary>,
    pub options: Option<OptionsChain>,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub price: f64,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsSummary {
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub source: Option<String>,
    pub is_issue_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingSummary {
    pub filing_type: String,
    pub period_end: Option<NaiveDate>,
    pub file_date: NaiveDate,
    pub file_url: String,
}

/// Which inputs were available, so the model can state its limitations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    pub has_options: bool,
    pub has_recent_news: bool,
    pub has_earnings_data: bool,
    pub has_fundamentals: bool,
}

/// Fetched data for one symbol, borrowed while the payload is built
#[derive(Debug, Clone, Copy)]
pub struct PayloadSources<'a> {
    pub symbol: &'a str,
    /// Display name when the quote carries none
    pub fallback_name: &'a str,
    pub quote: &'a Quote,
    pub earnings: &'a EarningsData,
    pub news: &'a [NewsItem],
    pub options: Option<&'a OptionsChain>,
    pub filings: &'a [Filing],
}

impl EvaluationPayload {
    /// Build the payload, keeping the `news_limit` most recent news items and
    /// the `filings_limit` most recent filings
    pub fn assemble(sources: PayloadSources<'_>, news_limit: usize, filings_limit: usize) -> Self {
        let quote = sources.quote;

        let mut news: Vec<&NewsItem> = sources.news.iter().collect();
        news.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        let news = news
            .into_iter()
            .take(news_limit)
            .map(|item| NewsSummary {
                title: item.title.clone(),
                published_at: item.published_at,
                source: item.source.clone(),
                is_issue_flag: item.issue_flag,
            })
            .collect();

        let mut filings: Vec<&Filing> = sources.filings.iter().collect();
        filings.sort_by(|a, b| b.file_date.cmp(&a.file_date));
        let filings = filings
            .into_iter()
            .take(filings_limit)
            .map(|f| FilingSummary {
                filing_type: f.filing_type.clone(),
                period_end: f.period_end,
                file_date: f.file_date,
                file_url: f.file_url.clone(),
            })
            .collect();

        Self {
            symbol: sources.symbol.to_string(),
            name: quote
                .name
                .clone()
                .unwrap_or_else(|| sources.fallback_name.to_string()),
            quote: QuoteSummary {
                price: quote.price,
                market_cap: quote.market_cap,
                pe_ratio: quote.pe_ratio,
                dividend_yield: quote.dividend_yield,
                beta: quote.beta,
                high_52w: quote.high_52w,
                low_52w: quote.low_52w,
            },
            earnings: sources.earnings.clone(),
            news,
            filings,
            options: sources.options.cloned(),
            data_quality: DataQuality {
                has_options: sources.options.is_some(),
                has_recent_news: !sources.news.is_empty(),
                has_earnings_data: !sources.earnings.is_empty(),
                has_fundamentals: quote.has_fundamentals(),
            },
        }
    }

    /// Indented JSON embedded in the model prompt
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
