use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::models::{Page, RampResource};
use crate::config::{require, RampConfig};
use crate::error::{ApiResult, ClientError};
use crate::http::{join_url, send_json, QueryParams};
use crate::oauth::{request_token, TokenGrant, TokenResponse};

/// Upper bound on pages walked by [`RampClient::fetch_all`].
const MAX_PAGES: usize = 1_000;

/// Ramp developer API client.
///
/// Configuration is checked when an operation needs it, so a client can be
/// built from a partial config and still report exactly which value is missing.
pub struct RampClient {
    config: RampConfig,
    client: Client,
}

impl RampClient {
    pub fn new(config: RampConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Use a custom HTTP client (timeouts, proxies).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Override API base URL (useful for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn config(&self) -> &RampConfig {
        &self.config
    }

    fn base_url(&self) -> Result<&str, ClientError> {
        require(&self.config.base_url, RampConfig::BASE_URL_VAR)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        join_url(self.base_url()?, &format!("developer/v1/{path}"))
    }

    /// Obtain an access token via the client-credentials grant.
    pub async fn fetch_access_token(&self) -> ApiResult<TokenResponse> {
        let base_url = self.base_url()?;
        let client_id = require(&self.config.client_id, RampConfig::CLIENT_ID_VAR)?;
        let client_secret = require(&self.config.client_secret, RampConfig::CLIENT_SECRET_VAR)?;
        let scope = require(&self.config.scope, RampConfig::SCOPE_VAR)?;

        let url = join_url(base_url, "developer/v1/token")?;
        let secret = SecretString::from(client_secret.to_string());
        let grant = TokenGrant::ClientCredentials {
            scope: scope.to_string(),
        };

        let token = request_token(&self.client, url.as_str(), client_id, &secret, &grant).await?;
        tracing::info!(scope = ?token.model.scope, "Fetched Ramp access token");
        Ok(token)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        access_token: &SecretString,
        context: &str,
    ) -> ApiResult<T> {
        tracing::debug!(url = %url, "Ramp GET");
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token.expose_secret()))
            .header(CONTENT_TYPE, "application/json");
        send_json(request, context).await
    }

    /// Fetch one page of a collection.
    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        resource: RampResource,
        access_token: &SecretString,
        params: &QueryParams,
    ) -> ApiResult<Page<T>> {
        let mut url = self.endpoint(resource.path())?;
        params.apply(&mut url);
        self.get(url, access_token, resource.path()).await
    }

    /// Fetch a single entity by id.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        resource: RampResource,
        access_token: &SecretString,
        id: &str,
    ) -> ApiResult<T> {
        if id.trim().is_empty() {
            return Err(ClientError::validation(format!("{resource} id must not be empty")));
        }
        let mut url = self.endpoint(resource.path())?;
        url.path_segments_mut()
            .map_err(|_| ClientError::validation("base URL cannot carry a path"))?
            .push(id);
        self.get(url, access_token, resource.path()).await
    }

    /// Walk every page of a collection, starting from `params`.
    ///
    /// The configured page size is used unless `params` sets `page_size`.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: RampResource,
        access_token: &SecretString,
        params: &QueryParams,
    ) -> Result<Vec<T>, ClientError> {
        let mut params = params.clone();
        if params.get("page_size").is_none() {
            params.set("page_size", self.config.page_size);
        }

        let mut items = Vec::new();
        for page_number in 1..=MAX_PAGES {
            let page = self
                .fetch_collection::<T>(resource, access_token, &params)
                .await?
                .into_model();
            let next = page.next_link().map(next_start).transpose()?;
            items.extend(page.data);

            match next {
                Some(start) => params.set("start", start),
                None => {
                    tracing::info!(
                        resource = %resource,
                        pages = page_number,
                        items = items.len(),
                        "Fetched Ramp collection"
                    );
                    return Ok(items);
                }
            }
        }

        tracing::warn!(
            resource = %resource,
            max_pages = MAX_PAGES,
            "Stopped paging Ramp collection at page limit"
        );
        Ok(items)
    }
}

/// Extract the `start` cursor from a `page.next` URL.
pub fn next_start(next: &str) -> Result<String, ClientError> {
    let pagination_error = || ClientError::Pagination {
        next: next.to_string(),
    };
    let url = Url::parse(next).map_err(|_| pagination_error())?;
    url.query_pairs()
        .find(|(k, v)| k == "start" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
        .ok_or_else(pagination_error)
}
