use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::range::{ReportRange, ReportRequest};
use super::report::{parse_report_str, ParsedReport};
use crate::config::QboConfig;
use crate::credentials::ApiCredentials;
use crate::error::{ApiResult, ClientError};
use crate::http::{join_url, send_text, QueryParams};

const DEFAULT_START_POSITION: u32 = 1;
const DEFAULT_MAX_RESULTS: u32 = 100;

/// QuickBooks Online accounting API client.
///
/// Holds no credentials; every call borrows an [`ApiCredentials`].
pub struct QboClient {
    client: Client,
    timeout: Option<Duration>,
}

impl QboClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: None,
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Per-request timeout. Unset by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn company_url(&self, creds: &ApiCredentials, path: &str) -> Result<Url, ClientError> {
        let base_url = non_blank(&creds.base_url, QboConfig::BASE_URL_VAR)?;
        let realm_id = non_blank(&creds.realm_id, QboConfig::REALM_ID_VAR)?;
        let mut url = join_url(base_url, "v3/company")?;
        url.path_segments_mut()
            .map_err(|_| ClientError::validation("base URL cannot carry a path"))?
            .push(realm_id)
            .extend(path.split('/'));
        Ok(url)
    }

    fn authorized(&self, creds: &ApiCredentials, url: Url) -> RequestBuilder {
        let request = self.client.get(url).header(
            AUTHORIZATION,
            format!("Bearer {}", creds.access_token.expose_secret()),
        );
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn get_text(&self, request: RequestBuilder, what: &str) -> ApiResult<String> {
        send_text(request).await.map_err(|err| match err {
            ClientError::Transport(e) if e.is_timeout() => ClientError::Timeout(what.to_string()),
            other => other,
        })
    }

    /// Run `SELECT * FROM <entity>` and return the matching entities.
    ///
    /// `start_position` defaults to 1 and `max_results` to 100.
    pub async fn query<T: DeserializeOwned>(
        &self,
        creds: &ApiCredentials,
        entity: &str,
        start_position: Option<u32>,
        max_results: Option<u32>,
    ) -> ApiResult<Vec<T>> {
        let mut url = self.company_url(creds, "query")?;
        validate_entity(entity)?;

        let statement = format!(
            "SELECT * FROM {entity} STARTPOSITION {} MAXRESULTS {}",
            start_position.unwrap_or(DEFAULT_START_POSITION),
            max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        );
        QueryParams::new()
            .with("query", statement.as_str())
            .with_opt("minorversion", creds.minor_version.as_deref())
            .apply(&mut url);

        tracing::debug!(entity, query = %statement, "QBO query");
        let response = self
            .get_text(self.authorized(creds, url), &format!("{entity} query"))
            .await?;

        let context = format!("{entity} query response");
        let body: Value = serde_json::from_str(&response.model).map_err(|source| {
            ClientError::Decode {
                context: context.clone(),
                source,
            }
        })?;
        let items = body
            .get("QueryResponse")
            .and_then(|r| r.get(entity))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let items: Vec<T> = serde_json::from_value(items)
            .map_err(|source| ClientError::Decode { context, source })?;

        tracing::info!(entity, count = items.len(), "Fetched QBO entities");
        Ok(response.map(|_| items))
    }

    /// Fetch and parse a report.
    pub async fn fetch_report(
        &self,
        creds: &ApiCredentials,
        request: &ReportRequest,
    ) -> ApiResult<ParsedReport> {
        let mut url = self.company_url(creds, &format!("reports/{}", request.name))?;
        request
            .query_params(creds.minor_version.as_deref())
            .apply(&mut url);

        tracing::debug!(report = %request.name, url = %url, "Fetching QBO report");
        let response = self
            .get_text(self.authorized(creds, url), &format!("{} report", request.name))
            .await?;

        let report = parse_report_str(&request.name, &response.model)?;
        tracing::info!(report = %request.name, rows = report.rows.len(), "Fetched QBO report");
        Ok(response.map(|_| report))
    }

    /// Validate `start_date`/`end_date` and fetch the named report with its
    /// standard parameters. Invalid dates fail before any request is sent.
    pub async fn fetch_report_for_dates(
        &self,
        creds: &ApiCredentials,
        name: &str,
        start_date: &str,
        end_date: &str,
    ) -> ApiResult<ParsedReport> {
        let range = ReportRange::new(start_date, end_date)?;
        self.fetch_report(creds, &ReportRequest::for_report(name, range))
            .await
    }
}

impl Default for QboClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity names are spliced into a query statement, so only plain
/// identifiers such as `Account` or `Vendor` are accepted.
pub fn validate_entity(entity: &str) -> Result<(), ClientError> {
    if entity.is_empty() || !entity.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::validation(format!("invalid QBO entity: {entity:?}")));
    }
    Ok(())
}

fn non_blank<'a>(value: &'a str, var: &'static str) -> Result<&'a str, ClientError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ClientError::not_set(var))
    } else {
        Ok(value)
    }
}
