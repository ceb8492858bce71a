//! Provider credentials: encryption at rest and resolution order
//!
//! A credential stored through the CLI wins over the environment. Stored
//! values are AES-256-GCM ciphertexts keyed from `ENCRYPTION_PASSWORD`.

use crate::error::{AnalysisError, Result};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng},
};
use argon2::Argon2;
use base64::Engine;
use rand::RngCore;
use research_core::{ProviderKey, mask_key};
use research_store::Database;
use research_utils::AppSettings;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const KEY_SALT: &[u8] = b"stock_research_salt";

/// AES-256-GCM cipher for stored credentials.
///
/// Stored form is `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Derive the key from a password with Argon2
    pub fn from_password(password: &str) -> Result<Self> {
        let mut key = [0u8; KEY_SIZE];
        Argon2::default()
            .hash_password_into(password.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| AnalysisError::Encryption(format!("Key derivation failed: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AnalysisError::Encryption(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AnalysisError::Encryption(e.to_string()))?;

        let mut stored = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        stored.extend_from_slice(&nonce_bytes);
        stored.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(stored))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(stored.trim())
            .map_err(|e| AnalysisError::Encryption(format!("Invalid base64: {e}")))?;

        if bytes.len() <= NONCE_SIZE {
            return Err(AnalysisError::Encryption(format!(
                "Ciphertext too short: {} bytes",
                bytes.len()
            )));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AnalysisError::Encryption(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AnalysisError::Encryption(format!("Invalid UTF-8 in plaintext: {e}")))
    }
}

/// Whether a provider has a usable credential, and where it comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub provider: ProviderKey,
    pub stored: bool,
    pub from_env: bool,
    /// Masked form of the credential that [`CredentialStore::resolve`] returns
    pub masked: Option<String>,
}

/// Resolves provider credentials: stored and decrypted first, then the environment
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
    cipher: SecretCipher,
    defaults: HashMap<ProviderKey, String>,
}

impl CredentialStore {
    pub fn new(db: Database, cipher: SecretCipher) -> Self {
        Self {
            db,
            cipher,
            defaults: HashMap::new(),
        }
    }

    /// Build from process settings, deriving the cipher from `ENCRYPTION_PASSWORD`
    pub fn from_settings(db: Database, settings: &AppSettings) -> Result<Self> {
        settings.warn_insecure_defaults();
        let cipher = SecretCipher::from_password(&settings.encryption_password)?;

        let mut store = Self::new(db, cipher);
        for provider in ProviderKey::ALL {
            if let Some(value) = settings.default_credential(provider) {
                store = store.with_default(provider, value);
            }
        }
        Ok(store)
    }

    /// Register an environment-configured fallback
    pub fn with_default(mut self, provider: ProviderKey, value: impl Into<String>) -> Self {
        self.defaults.insert(provider, value.into());
        self
    }

    pub fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }

    /// Credential for `provider`, or `None` when neither source has one.
    ///
    /// The options endpoint falls back to the market data credential.
    pub async fn resolve(&self, provider: ProviderKey) -> Result<Option<String>> {
        let resolved = self.resolve_exact(provider).await?;
        if resolved.is_none() && provider == ProviderKey::Options {
            return self.resolve_exact(ProviderKey::MarketData).await;
        }
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve), but a missing credential is an error
    pub async fn require(&self, provider: ProviderKey) -> Result<String> {
        self.resolve(provider)
            .await?
            .ok_or(AnalysisError::Credential(provider))
    }

    async fn resolve_exact(&self, provider: ProviderKey) -> Result<Option<String>> {
        let secrets = self.db.load_secrets().await?;

        if let Some(stored) = secrets.get(provider) {
            match self.cipher.decrypt(stored) {
                Ok(value) if !value.is_empty() => {
                    debug!(%provider, "Using stored credential");
                    return Ok(Some(value));
                },
                Ok(_) => {},
                Err(e) => warn!(%provider, error = %e, "Stored credential unreadable, ignoring"),
            }
        }

        Ok(self.defaults.get(&provider).cloned())
    }

    /// Encrypt and store a credential; `None` or an empty value clears it
    pub async fn store(&self, provider: ProviderKey, plaintext: Option<&str>) -> Result<()> {
        let ciphertext = match plaintext.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => Some(self.cipher.encrypt(value)?),
            None => None,
        };

        self.db
            .store_encrypted_secret(provider, ciphertext.as_deref())
            .await?;
        Ok(())
    }

    /// Per-provider availability, with masked values
    pub async fn status(&self) -> Result<Vec<CredentialStatus>> {
        let secrets = self.db.load_secrets().await?;

        let mut statuses = Vec::with_capacity(ProviderKey::ALL.len());
        for provider in ProviderKey::ALL {
            let resolved = self.resolve(provider).await?;
            statuses.push(CredentialStatus {
                provider,
                stored: secrets.get(provider).is_some(),
                from_env: self.defaults.contains_key(&provider),
                masked: resolved.as_deref().map(mask_key),
            });
        }
        Ok(statuses)
    }
}
