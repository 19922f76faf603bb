//! API credentials and refresh-token persistence.
//!
//! The clients only ever borrow [`ApiCredentials`]; they never write tokens
//! anywhere. Callers that need a rotating QBO refresh token to survive
//! restarts keep it in a [`TokenStore`].

mod file;

pub use file::FileTokenStore;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Everything needed to call an authenticated QBO endpoint.
#[derive(Debug)]
pub struct ApiCredentials {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub base_url: String,
    /// QBO company (realm) id.
    pub realm_id: String,
    /// QBO `minorversion` query parameter.
    pub minor_version: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiCredentials {
    pub fn new(
        access_token: SecretString,
        base_url: impl Into<String>,
        realm_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token: None,
            base_url: base_url.into(),
            realm_id: realm_id.into(),
            minor_version: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: SecretString) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    pub fn with_minor_version(mut self, minor_version: impl Into<String>) -> Self {
        self.minor_version = Some(minor_version.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// True when the access token is known to have expired at `now`.
    /// Credentials without an expiry are assumed valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A key-value store for long-lived tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns `Ok(None)` if nothing is stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<SecretString>>;

    async fn save(&self, key: &str, token: SecretString) -> Result<()>;

    /// Remove the token. Missing keys are not an error.
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-process token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, key: &str) -> Result<Option<SecretString>> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        Ok(tokens.get(key).cloned().map(SecretString::from))
    }

    async fn save(&self, key: &str, token: SecretString) -> Result<()> {
        use secrecy::ExposeSecret;
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        tokens.insert(key.to_string(), token.expose_secret().to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        tokens.remove(key);
        Ok(())
    }
}
