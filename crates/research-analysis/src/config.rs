//! Configuration for the analysis pipeline

use crate::error::{AnalysisError, Result};
use research_utils::config::DEFAULT_OPENAI_MODEL;
use std::time::Duration;

/// Candidate symbols ranked by market cap when resolving the daily universe
pub const DEFAULT_LARGE_CAP_CANDIDATES: [&str; 20] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "JPM", "JNJ", "V", "PG", "UNH", "HD",
    "MA", "DIS", "PYPL", "ADBE", "NFLX", "CRM", "PEP",
];

/// Tunables shared by the providers, the rating model and the orchestrator
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on each market data and news call
    pub provider_timeout: Duration,

    /// Bound on the rating model call
    pub model_timeout: Duration,

    /// Bound on ranking the large-cap universe, which is rate limited
    pub universe_timeout: Duration,

    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,

    /// Days of company news to request
    pub news_lookback_days: u32,

    /// News items forwarded to the model
    pub payload_news_limit: usize,

    /// Stored filings forwarded to the model
    pub payload_filings_limit: usize,

    /// Market data requests per minute
    pub market_rate_limit: u32,

    /// News requests per minute
    pub news_rate_limit: u32,

    pub quote_cache_ttl: Duration,

    /// Parallel quote lookups while ranking candidates
    pub ranking_concurrency: usize,

    pub large_cap_candidates: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            model_timeout: Duration::from_secs(120),
            universe_timeout: Duration::from_secs(15 * 60),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            news_lookback_days: 7,
            payload_news_limit: 5,
            payload_filings_limit: 5,
            market_rate_limit: 5, // free tier
            news_rate_limit: 60,
            quote_cache_ttl: Duration::from_secs(60),
            ranking_concurrency: 4,
            large_cap_candidates: DEFAULT_LARGE_CAP_CANDIDATES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider_timeout.is_zero()
            || self.model_timeout.is_zero()
            || self.universe_timeout.is_zero()
        {
            return Err(AnalysisError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(AnalysisError::Config("model must not be empty".to_string()));
        }

        if self.max_tokens == 0 {
            return Err(AnalysisError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AnalysisError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }

        if self.market_rate_limit == 0 || self.news_rate_limit == 0 {
            return Err(AnalysisError::Config(
                "rate limits must be greater than 0".to_string(),
            ));
        }

        if self.ranking_concurrency == 0 {
            return Err(AnalysisError::Config(
                "ranking_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.large_cap_candidates.is_empty() {
            return Err(AnalysisError::Config(
                "large-cap candidate list is empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    provider_timeout: Option<Duration>,
    model_timeout: Option<Duration>,
    universe_timeout: Option<Duration>,
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    news_lookback_days: Option<u32>,
    payload_news_limit: Option<usize>,
    market_rate_limit: Option<u32>,
    news_rate_limit: Option<u32>,
    quote_cache_ttl: Option<Duration>,
    large_cap_candidates: Option<Vec<String>>,
}

impl PipelineConfigBuilder {
    pub fn provider_timeout(mut self, duration: Duration) -> Self {
        self.provider_timeout = Some(duration);
        self
    }

    pub fn model_timeout(mut self, duration: Duration) -> Self {
        self.model_timeout = Some(duration);
        self
    }

    pub fn universe_timeout(mut self, duration: Duration) -> Self {
        self.universe_timeout = Some(duration);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn news_lookback_days(mut self, days: u32) -> Self {
        self.news_lookback_days = Some(days);
        self
    }

    pub fn payload_news_limit(mut self, limit: usize) -> Self {
        self.payload_news_limit = Some(limit);
        self
    }

    pub fn market_rate_limit(mut self, per_minute: u32) -> Self {
        self.market_rate_limit = Some(per_minute);
        self
    }

    pub fn news_rate_limit(mut self, per_minute: u32) -> Self {
        self.news_rate_limit = Some(per_minute);
        self
    }

    pub fn quote_cache_ttl(mut self, ttl: Duration) -> Self {
        self.quote_cache_ttl = Some(ttl);
        self
    }

    /// Replace the symbols ranked for the large-cap universe
    pub fn large_cap_candidates<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.large_cap_candidates = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let config = PipelineConfig {
            provider_timeout: self.provider_timeout.unwrap_or(defaults.provider_timeout),
            model_timeout: self.model_timeout.unwrap_or(defaults.model_timeout),
            universe_timeout: self.universe_timeout.unwrap_or(defaults.universe_timeout),
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            news_lookback_days: self.news_lookback_days.unwrap_or(defaults.news_lookback_days),
            payload_news_limit: self.payload_news_limit.unwrap_or(defaults.payload_news_limit),
            payload_filings_limit: defaults.payload_filings_limit,
            market_rate_limit: self.market_rate_limit.unwrap_or(defaults.market_rate_limit),
            news_rate_limit: self.news_rate_limit.unwrap_or(defaults.news_rate_limit),
            quote_cache_ttl: self.quote_cache_ttl.unwrap_or(defaults.quote_cache_ttl),
            ranking_concurrency: defaults.ranking_concurrency,
            large_cap_candidates: self
                .large_cap_candidates
                .unwrap_or(defaults.large_cap_candidates),
        };

        config.validate()?;
        Ok(config)
    }
}
