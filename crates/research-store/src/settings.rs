//! Singleton configuration and encrypted secrets records

use crate::Database;
use crate::error::Result;
use crate::rows::ConfigRow;
use research_core::{ConfigUpdate, ProviderKey, UserConfig};
use sqlx::FromRow;

/// Encrypted credentials as stored; decryption happens in the credential store
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct SecretsRecord {
    pub openai_api_key_encrypted: Option<String>,
    pub market_data_api_key_encrypted: Option<String>,
    pub news_api_key_encrypted: Option<String>,
    pub options_api_key_encrypted: Option<String>,
}

impl SecretsRecord {
    pub fn get(&self, provider: ProviderKey) -> Option<&str> {
        match provider {
            ProviderKey::OpenAi => self.openai_api_key_encrypted.as_deref(),
            ProviderKey::MarketData => self.market_data_api_key_encrypted.as_deref(),
            ProviderKey::News => self.news_api_key_encrypted.as_deref(),
            ProviderKey::Options => self.options_api_key_encrypted.as_deref(),
        }
    }
}

fn secret_column(provider: ProviderKey) -> &'static str {
    match provider {
        ProviderKey::OpenAi => "openai_api_key_encrypted",
        ProviderKey::MarketData => "market_data_api_key_encrypted",
        ProviderKey::News => "news_api_key_encrypted",
        ProviderKey::Options => "options_api_key_encrypted",
    }
}

impl Database {
    /// Read the configuration, creating the default record on first access
    pub async fn load_or_create_config(&self) -> Result<UserConfig> {
        let defaults = UserConfig::default();
        sqlx::query(
            "INSERT INTO user_config (id, top_n, universe, custom_tickers, \
               daily_run_time_local, time_zone) \
             VALUES (1, ?, ?, ?, ?, ?) ON CONFLICT (id) DO NOTHING",
        )
        .bind(i64::from(defaults.top_n))
        .bind(&defaults.universe)
        .bind(serde_json::to_string(&defaults.custom_tickers)?)
        .bind(&defaults.daily_run_time_local)
        .bind(&defaults.time_zone)
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, ConfigRow>(
            "SELECT top_n, universe, custom_tickers, daily_run_time_local, time_zone \
             FROM user_config WHERE id = 1",
        )
        .fetch_one(self.pool())
        .await?
        .into_config()
    }

    /// Apply a partial update and return the stored result
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<UserConfig> {
        let next = self.load_or_create_config().await?.apply(update)?;

        sqlx::query(
            "UPDATE user_config SET top_n = ?, universe = ?, custom_tickers = ?, \
               daily_run_time_local = ?, time_zone = ? WHERE id = 1",
        )
        .bind(i64::from(next.top_n))
        .bind(&next.universe)
        .bind(serde_json::to_string(&next.custom_tickers)?)
        .bind(&next.daily_run_time_local)
        .bind(&next.time_zone)
        .execute(self.pool())
        .await?;

        Ok(next)
    }

    /// Read the secrets record, creating an empty one on first access
    pub async fn load_secrets(&self) -> Result<SecretsRecord> {
        sqlx::query("INSERT INTO user_secrets (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(self.pool())
            .await?;

        let record = sqlx::query_as::<_, SecretsRecord>(
            "SELECT openai_api_key_encrypted, market_data_api_key_encrypted, \
               news_api_key_encrypted, options_api_key_encrypted \
             FROM user_secrets WHERE id = 1",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(record)
    }

    /// Replace one provider's ciphertext; `None` clears it
    pub async fn store_encrypted_secret(
        &self,
        provider: ProviderKey,
        ciphertext: Option<&str>,
    ) -> Result<()> {
        self.load_secrets().await?;

        let column = secret_column(provider);
        sqlx::query(&format!("UPDATE user_secrets SET {column} = ? WHERE id = 1"))
            .bind(ciphertext)
            .execute(self.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[tokio::test]
    async fn test_config_first_or_create() {
        let db = Database::in_memory().await.unwrap();

        let config = db.load_or_create_config().await.unwrap();
        assert_eq!(config, UserConfig::default());

        db.load_or_create_config().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_config")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_update_config() {
        let db = Database::in_memory().await.unwrap();

        let updated = db
            .update_config(ConfigUpdate {
                top_n: Some(3),
                custom_tickers: Some(vec!["xom".into()]),
                time_zone: Some("Europe/London".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.custom_tickers, vec!["XOM"]);

        let reloaded = db.load_or_create_config().await.unwrap();
        assert_eq!(reloaded, updated);
        assert_eq!(reloaded.top_n, 3);
        assert_eq!(reloaded.universe, "US_LARGE_CAP");

        let err = db
            .update_config(ConfigUpdate {
                top_n: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(_)));
        assert_eq!(db.load_or_create_config().await.unwrap().top_n, 3);
    }

    #[tokio::test]
    async fn test_secrets_roundtrip() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.load_secrets().await.unwrap(), SecretsRecord::default());

        db.store_encrypted_secret(ProviderKey::OpenAi, Some("cipher-1"))
            .await
            .unwrap();
        db.store_encrypted_secret(ProviderKey::News, Some("cipher-2"))
            .await
            .unwrap();

        let secrets = db.load_secrets().await.unwrap();
        assert_eq!(secrets.get(ProviderKey::OpenAi), Some("cipher-1"));
        assert_eq!(secrets.get(ProviderKey::News), Some("cipher-2"));
        assert_eq!(secrets.get(ProviderKey::MarketData), None);

        db.store_encrypted_secret(ProviderKey::OpenAi, None).await.unwrap();
        assert_eq!(db.load_secrets().await.unwrap().get(ProviderKey::OpenAi), None);
    }
}
