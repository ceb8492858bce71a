//! Process-level settings read from the environment
//!
//! Binaries load an optional `.env` file before calling
//! [`AppSettings::from_env`]; library code only ever sees the resulting struct.

use crate::logging::LogFormat;
use research_core::ProviderKey;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://stock_research.db";
pub const DEFAULT_ENCRYPTION_PASSWORD: &str = "default-password-change-in-production";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Invalid environment value
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Settings shared by every entry point
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// sqlx connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Password the credential cipher key is derived from (`ENCRYPTION_PASSWORD`)
    pub encryption_password: String,
    /// Base URL of the OpenAI-compatible endpoint (`OPENAI_API_BASE`)
    pub openai_api_base: String,
    /// Model used for ratings (`OPENAI_MODEL`)
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    /// `ALPHA_VANTAGE_API_KEY`, or `MARKET_DATA_API_KEY`
    pub market_data_api_key: Option<String>,
    /// `FINNHUB_API_KEY`, or `NEWS_API_KEY`
    pub news_api_key: Option<String>,
    pub options_api_key: Option<String>,
    /// `LOG_FORMAT`: `text` or `json`
    pub log_format: LogFormat,
}

impl AppSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let log_format = match var("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|reason| SettingsError::Invalid {
                var: "LOG_FORMAT",
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            encryption_password: var("ENCRYPTION_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ENCRYPTION_PASSWORD.to_string()),
            openai_api_base: var("OPENAI_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_key: var("OPENAI_API_KEY"),
            market_data_api_key: var("ALPHA_VANTAGE_API_KEY").or_else(|| var("MARKET_DATA_API_KEY")),
            news_api_key: var("FINNHUB_API_KEY").or_else(|| var("NEWS_API_KEY")),
            options_api_key: var("OPTIONS_API_KEY"),
            log_format,
        })
    }

    /// Environment-configured credential for a provider
    pub fn default_credential(&self, provider: ProviderKey) -> Option<&str> {
        match provider {
            ProviderKey::OpenAi => self.openai_api_key.as_deref(),
            ProviderKey::MarketData => self.market_data_api_key.as_deref(),
            ProviderKey::News => self.news_api_key.as_deref(),
            ProviderKey::Options => self.options_api_key.as_deref(),
        }
    }

    /// Whether credentials are encrypted with the built-in password
    pub fn uses_default_encryption_password(&self) -> bool {
        self.encryption_password == DEFAULT_ENCRYPTION_PASSWORD
    }

    /// Log warnings for settings that are unsafe outside development
    pub fn warn_insecure_defaults(&self) {
        if self.uses_default_encryption_password() {
            tracing::warn!(
                "ENCRYPTION_PASSWORD is not set; stored API keys use the built-in default password"
            );
        }
    }
}
