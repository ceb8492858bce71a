//! Finnhub company news client

use super::{SharedRateLimiter, rate_limiter};
use crate::error::{AnalysisError, Result};
use crate::providers::{NewsItem, NewsProvider, is_issue_headline};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER: &str = "Finnhub";

/// Finnhub news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinnhubNewsArticle {
    #[serde(default)]
    pub category: String,
    /// Publish time (UNIX timestamp)
    pub datetime: i64,
    pub headline: String,
    #[serde(default)]
    pub id: i64,
    /// Related symbols
    #[serde(default)]
    pub related: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
}

impl FinnhubNewsArticle {
    /// Convert to a [`NewsItem`]; `None` when the headline or timestamp is unusable
    pub fn into_news_item(self) -> Option<NewsItem> {
        let published_at = DateTime::<Utc>::from_timestamp(self.datetime, 0)?;
        let title = self.headline.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let issue_flag = is_issue_headline(&title, &self.summary);
        let non_empty = |s: String| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        Some(NewsItem {
            title,
            url: self.url,
            published_at,
            source: non_empty(self.source),
            summary: non_empty(self.summary),
            issue_flag,
        })
    }
}

/// Finnhub client for the company news API
#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl FinnhubClient {
    /// Create a new Finnhub client with rate limiting
    ///
    /// # Arguments
    /// * `api_key` - Finnhub API key
    /// * `rate_limit` - Requests per minute (free tier: 60)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get company news published between `from` and `to`, inclusive
    pub async fn get_company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FinnhubNewsArticle>> {
        self.rate_limiter.until_ready().await;
        debug!(symbol, %from, %to, "Finnhub company-news request");

        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(format!("{}/company-news", self.base_url))
            .query(&[
                ("symbol", symbol),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::RateLimited(PROVIDER));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::provider(
                PROVIDER,
                format!("API error {status}: {body}"),
            ));
        }

        Ok(response.json::<Vec<FinnhubNewsArticle>>().await?)
    }
}

#[async_trait]
impl NewsProvider for FinnhubClient {
    async fn fetch_news(&self, symbol: &str, lookback_days: u32) -> Result<Vec<NewsItem>> {
        let to = Utc::now().date_naive();
        let from = to
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(to);

        let articles = self.get_company_news(symbol, from, to).await?;
        Ok(into_news_items(articles))
    }
}

/// Convert articles to news items, newest first
fn into_news_items(articles: Vec<FinnhubNewsArticle>) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = articles
        .into_iter()
        .filter_map(FinnhubNewsArticle::into_news_item)
        .collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}
