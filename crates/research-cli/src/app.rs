//! Wiring of settings, database, credentials and providers for one invocation

use anyhow::Context;
use research_analysis::{
    AlphaVantageClient, AnalysisOrchestrator, AnalysisService, ConnectionStatus, CredentialStore,
    FinnhubClient, OpenAiRatingFactory, PipelineConfig, RatingModelProvider, RatingProviderFactory,
    ResearchQueries,
};
use research_core::ProviderKey;
use research_store::Database;
use research_utils::{AppSettings, init_tracing_with};
use std::sync::Arc;
use tracing::debug;

pub struct App {
    settings: AppSettings,
    db: Database,
    credentials: CredentialStore,
    config: PipelineConfig,
}

impl App {
    /// Load settings, start logging and open the database
    pub async fn open(database_url: Option<&str>) -> anyhow::Result<Self> {
        let settings = AppSettings::from_env()?;
        init_tracing_with(settings.log_format);

        let url = database_url.unwrap_or(&settings.database_url);
        let db = Database::connect(url)
            .await
            .with_context(|| format!("failed to open database {url}"))?;
        debug!(database_url = %url, "Database ready");

        let credentials = CredentialStore::from_settings(db.clone(), &settings)?;
        let config = PipelineConfig::builder()
            .model(&settings.openai_model)
            .build()?;

        Ok(Self {
            settings,
            db,
            credentials,
            config,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn queries(&self) -> ResearchQueries {
        ResearchQueries::new(self.db.clone())
    }

    fn ratings(&self) -> OpenAiRatingFactory {
        OpenAiRatingFactory::new(
            self.credentials.clone(),
            &self.settings.openai_api_base,
            self.config.clone(),
        )
    }

    /// Service backed by the live providers.
    ///
    /// Market data and news credentials must resolve here. The model
    /// credential is resolved when a run starts.
    pub async fn service(&self) -> anyhow::Result<AnalysisService> {
        let market_key = self.credentials.require(ProviderKey::MarketData).await?;
        let mut market = AlphaVantageClient::from_config(market_key, &self.config);
        if let Some(options_key) = self.credentials.resolve(ProviderKey::Options).await? {
            market = market.with_options_api_key(options_key);
        }

        let news_key = self.credentials.require(ProviderKey::News).await?;
        let news = FinnhubClient::new(news_key, self.config.news_rate_limit);

        let orchestrator = AnalysisOrchestrator::new(
            self.db.clone(),
            Arc::new(market),
            Arc::new(news),
            Arc::new(self.ratings()),
            self.config.clone(),
        );
        Ok(AnalysisService::new(orchestrator))
    }

    /// Send a minimal prompt to the configured model
    pub async fn test_model(&self) -> anyhow::Result<ConnectionStatus> {
        let provider = self.ratings().create().await?;
        Ok(provider.test_connection().await)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
