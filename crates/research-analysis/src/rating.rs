//! Rating model provider
//!
//! [`LlmRatingProvider`] turns an [`EvaluationPayload`] into a [`Rating`].
//! It never fails: unparseable answers and failed calls both collapse into a
//! degraded hold/neutral rating so every analysed symbol gets a report.

use crate::config::PipelineConfig;
use crate::credentials::CredentialStore;
use crate::error::{AnalysisError, Result};
use crate::payload::EvaluationPayload;
use crate::prompts::PromptRenderer;
use async_trait::async_trait;
use regex::Regex;
use research_core::{ProviderKey, Rating};
use research_llm::providers::{OpenAIConfig, OpenAIProvider};
use research_llm::{CompletionRequest, LLMProvider, Message, StopReason};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TEST_PROMPT: &str = "Hello, this is a test.";

/// Outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

/// Produces a structured rating for a payload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingModelProvider: Send + Sync {
    /// Rate a payload; failures yield a degraded rating instead of an error
    async fn rate(&self, payload: &EvaluationPayload) -> Rating;

    /// Lightweight round trip; never fails
    async fn test_connection(&self) -> ConnectionStatus;

    /// Model identifier recorded on each report
    fn model_id(&self) -> String;
}

/// Rating provider backed by any chat-completion [`LLMProvider`]
pub struct LlmRatingProvider {
    llm: Arc<dyn LLMProvider>,
    prompts: PromptRenderer,
    fence: Regex,
    model: String,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
}

impl LlmRatingProvider {
    pub fn new(llm: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Result<Self> {
        let fence = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```")
            .map_err(|e| AnalysisError::Config(format!("Invalid fence pattern: {e}")))?;

        Ok(Self {
            llm,
            prompts: PromptRenderer::new()?,
            fence,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.model_timeout,
        })
    }

    /// Places a JSON document may sit in an answer, most literal first: the
    /// whole answer, the first fenced block, the outermost braces
    fn json_candidates<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        let fenced = self
            .fence
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let braces = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
            _ => None,
        };

        std::iter::once(text.trim()).chain(fenced).chain(braces)
    }

    /// Decode a model answer, degrading when it does not match the schema
    pub fn parse_rating(&self, text: &str) -> Rating {
        let mut last_error = None;
        for candidate in self.json_candidates(text) {
            match serde_json::from_str::<Rating>(candidate) {
                Ok(rating) => return rating,
                Err(e) => last_error = Some(e),
            }
        }

        if let Some(e) = last_error {
            warn!(error = %e, "Model answer does not match the rating schema");
        }
        Rating::degraded_unparsed(text)
    }
}

#[async_trait]
impl RatingModelProvider for LlmRatingProvider {
    async fn rate(&self, payload: &EvaluationPayload) -> Rating {
        let prompt = match self.prompts.render_user(payload) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(symbol = %payload.symbol, error = %e, "Failed to render rating prompt");
                return Rating::degraded_failure(e);
            },
        };

        let request = CompletionRequest::builder(&self.model)
            .system(self.prompts.system_prompt())
            .add_message(Message::user(prompt.clone()))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        debug!(symbol = %payload.symbol, model = %self.model, "Requesting rating");
        match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => {
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(symbol = %payload.symbol, "Rating answer hit the token limit");
                }
                let text = response.text().to_string();
                self.parse_rating(&text)
                    .with_provenance(Some(prompt), Some(text))
            },
            Ok(Err(e)) => {
                warn!(symbol = %payload.symbol, error = %e, "Rating model call failed");
                Rating::degraded_failure(e).with_provenance(Some(prompt), None)
            },
            Err(_) => {
                let cause = AnalysisError::Timeout {
                    stage: crate::error::Stage::Rating,
                    after: self.timeout,
                };
                warn!(symbol = %payload.symbol, error = %cause, "Rating model call timed out");
                Rating::degraded_failure(cause).with_provenance(Some(prompt), None)
            },
        }
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let request = CompletionRequest::builder(&self.model)
            .add_message(Message::user(TEST_PROMPT))
            .max_tokens(5)
            .build();

        match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(_)) => ConnectionStatus {
                success: true,
                message: format!("{} API connection successful", self.llm.name()),
            },
            Ok(Err(e)) => ConnectionStatus {
                success: false,
                message: format!("Connection failed: {e}"),
            },
            Err(_) => ConnectionStatus {
                success: false,
                message: format!("Connection failed: no answer within {}s", self.timeout.as_secs()),
            },
        }
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

/// Builds the rating provider for one orchestrator invocation
#[async_trait]
pub trait RatingProviderFactory: Send + Sync {
    /// Fails with [`AnalysisError::Credential`] when no model credential resolves
    async fn create(&self) -> Result<Arc<dyn RatingModelProvider>>;
}

/// A ready-made provider is its own factory
#[async_trait]
impl RatingProviderFactory for Arc<dyn RatingModelProvider> {
    async fn create(&self) -> Result<Arc<dyn RatingModelProvider>> {
        Ok(Arc::clone(self))
    }
}

/// Creates an OpenAI-backed provider with the credential current at call time
pub struct OpenAiRatingFactory {
    credentials: CredentialStore,
    api_base: String,
    config: PipelineConfig,
}

impl OpenAiRatingFactory {
    pub fn new(credentials: CredentialStore, api_base: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            credentials,
            api_base: api_base.into(),
            config,
        }
    }
}

#[async_trait]
impl RatingProviderFactory for OpenAiRatingFactory {
    async fn create(&self) -> Result<Arc<dyn RatingModelProvider>> {
        let api_key = self.credentials.require(ProviderKey::OpenAi).await?;

        let llm = OpenAIProvider::with_config(
            OpenAIConfig::new(api_key)
                .with_api_base(&self.api_base)
                .with_timeout(self.config.model_timeout.as_secs()),
        )?;

        Ok(Arc::new(LlmRatingProvider::new(Arc::new(llm), &self.config)?))
    }
}
