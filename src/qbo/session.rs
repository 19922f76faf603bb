//! Authenticated QBO calls driven by a cached refresh token.

use anyhow::{Context, Result};
use chrono::Utc;
use secrecy::SecretString;
use serde::de::DeserializeOwned;

use super::auth::QboAuth;
use super::client::{validate_entity, QboClient};
use super::range::{ReportRange, ReportRequest};
use super::report::ParsedReport;
use crate::credentials::{ApiCredentials, TokenStore};

/// Pairs [`QboAuth`] with a [`TokenStore`] holding the refresh token.
///
/// Every call validates its own arguments first; only then is the
/// discovery document fetched and the refresh token spent.
pub struct QboSession<'a> {
    auth: &'a QboAuth,
    store: &'a dyn TokenStore,
}

impl<'a> QboSession<'a> {
    pub fn new(auth: &'a QboAuth, store: &'a dyn TokenStore) -> Self {
        Self { auth, store }
    }

    /// Refresh with the cached token and persist the rotated one.
    pub async fn credentials(&self) -> Result<ApiCredentials> {
        let key = self.auth.config().refresh_token_key();
        let refresh_token = self.store.load(&key).await?.with_context(|| {
            format!("No cached QBO refresh token ({key}); run `ledgerlink qbo login` first")
        })?;

        let discovery = self.auth.discover().await?.into_model();
        let tokens = self.auth.refresh(&discovery, refresh_token).await?.into_model();
        if let Some(rotated) = &tokens.refresh_token {
            self.store
                .save(&key, SecretString::from(rotated.clone()))
                .await?;
        }
        Ok(self.auth.credentials_from_tokens(&tokens, Utc::now())?)
    }

    /// Fetch a report for `start_date..=end_date`.
    pub async fn fetch_report(
        &self,
        client: &QboClient,
        name: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<ParsedReport> {
        let range = ReportRange::new(start_date, end_date)?;
        let creds = self.credentials().await?;
        let report = client
            .fetch_report(&creds, &ReportRequest::for_report(name, range))
            .await?;
        Ok(report.into_model())
    }

    /// Run `SELECT * FROM <entity>`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        client: &QboClient,
        entity: &str,
        start_position: Option<u32>,
        max_results: Option<u32>,
    ) -> Result<Vec<T>> {
        validate_entity(entity)?;
        let creds = self.credentials().await?;
        let items = client
            .query(&creds, entity, start_position, max_results)
            .await?;
        Ok(items.into_model())
    }
}
