//! Error types for the analysis pipeline

use research_core::ProviderKey;
use research_llm::LLMError;
use research_store::StoreError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Step of the per-symbol procedure, attached to log events and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Quote,
    Earnings,
    News,
    Options,
    Rating,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Earnings => "earnings",
            Self::News => "news",
            Self::Options => "options",
            Self::Rating => "rating",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis pipeline errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Pipeline or run configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// No credential could be resolved for a provider
    #[error("No credential configured for {0}")]
    Credential(ProviderKey),

    /// Credential cipher failure
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// External data provider returned an error
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// External data provider throttled the request
    #[error("Rate limit exceeded for {0}")]
    RateLimited(&'static str),

    /// The stock record does not carry the requested symbol
    #[error("Stock {stock_id} is {actual}, not {requested}")]
    SymbolMismatch {
        stock_id: i64,
        requested: String,
        actual: String,
    },

    #[error("{stage} call timed out after {}s", .after.as_secs())]
    Timeout { stage: Stage, after: Duration },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Prompt template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Language model error: {0}")]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] research_core::Error),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Whether the error must fail the whole run rather than one symbol
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Credential(_) | Self::Encryption(_) | Self::Template(_)
        )
    }

    /// Whether the trigger was refused because an equivalent run is active
    pub fn is_duplicate_run(&self) -> bool {
        matches!(self, Self::Store(StoreError::RunAlreadyActive { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::Timeout {
            stage: Stage::News,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "news call timed out after 30s");

        let err = AnalysisError::Credential(ProviderKey::OpenAi);
        assert_eq!(err.to_string(), "No credential configured for openai");

        let err = AnalysisError::provider("Finnhub", "HTTP 502");
        assert_eq!(err.to_string(), "Finnhub error: HTTP 502");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AnalysisError::Config("bad".into()).is_fatal());
        assert!(AnalysisError::Credential(ProviderKey::OpenAi).is_fatal());
        assert!(!AnalysisError::RateLimited("Alpha Vantage").is_fatal());
        assert!(
            !AnalysisError::Timeout {
                stage: Stage::Quote,
                after: Duration::from_secs(1)
            }
            .is_fatal()
        );
    }
}
