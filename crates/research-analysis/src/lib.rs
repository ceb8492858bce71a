//! Analysis pipeline for stock-research-rs
//!
//! This crate turns market data into stored research reports:
//!
//! - Provider contracts for quotes, earnings, options and news, with Alpha
//!   Vantage and Finnhub clients behind them
//! - Evaluation payload assembly and the language-model rating provider
//! - Encrypted provider credentials with environment fallback
//! - The [`AnalysisOrchestrator`] that runs daily batches and single-symbol
//!   analyses with per-symbol isolation
//! - The [`AnalysisService`] trigger and the [`DailyScheduler`]
//!
//! # Example
//!
//! ```rust,ignore
//! use research_analysis::{
//!     AlphaVantageClient, AnalysisOrchestrator, AnalysisService, CredentialStore,
//!     FinnhubClient, OpenAiRatingFactory, PipelineConfig,
//! };
//! use research_core::ProviderKey;
//! use research_store::Database;
//! use research_utils::AppSettings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = AppSettings::from_env()?;
//!     let db = Database::connect(&settings.database_url).await?;
//!     let credentials = CredentialStore::from_settings(db.clone(), &settings)?;
//!     let config = PipelineConfig::default();
//!
//!     let market = AlphaVantageClient::from_config(
//!         credentials.require(ProviderKey::MarketData).await?,
//!         &config,
//!     );
//!     let news = FinnhubClient::new(
//!         credentials.require(ProviderKey::News).await?,
//!         config.news_rate_limit,
//!     );
//!     let ratings = OpenAiRatingFactory::new(credentials, &settings.openai_api_base, config.clone());
//!
//!     let orchestrator = AnalysisOrchestrator::new(
//!         db,
//!         Arc::new(market),
//!         Arc::new(news),
//!         Arc::new(ratings),
//!         config,
//!     );
//!     let service = AnalysisService::new(orchestrator);
//!
//!     let (_stock, handle) = service.trigger_on_demand("AAPL").await?;
//!     println!("{:?}", handle.await??);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod prompts;
pub mod providers;
pub mod rating;
pub mod scheduler;
pub mod trigger;

pub use api::{AlphaVantageClient, FinnhubClient};
pub use cache::QuoteCache;
pub use config::{DEFAULT_LARGE_CAP_CANDIDATES, PipelineConfig, PipelineConfigBuilder};
pub use credentials::{CredentialStatus, CredentialStore, SecretCipher};
pub use error::{AnalysisError, Result, Stage};
pub use orchestrator::{AnalysisOrchestrator, RunSummary, SymbolOutcome, merge_universe};
pub use payload::{DataQuality, EvaluationPayload, PayloadSources};
pub use prompts::PromptRenderer;
pub use providers::{
    EarningsData, EarningsItem, MarketDataProvider, NewsItem, NewsProvider, OptionContract,
    OptionsChain, Quote,
};
pub use rating::{
    ConnectionStatus, LlmRatingProvider, OpenAiRatingFactory, RatingModelProvider,
    RatingProviderFactory,
};
pub use scheduler::DailyScheduler;
pub use trigger::{AnalysisService, DailyRunHandle, OnDemandHandle, ResearchQueries};
