//! QBO OAuth2: discovery, consent URL, redirect capture and token exchange.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::config::{require, QboConfig};
use crate::credentials::ApiCredentials;
use crate::error::{ApiResult, ClientError};
use crate::http::{send_json, QueryParams};
use crate::oauth::{request_token, TokenGrant, TokenResponse};

const CALLBACK_PAGE: &str = "<html><body><h3>QuickBooks authorization received.</h3>\
<p>You can close this window.</p></body></html>";

/// How long to let the redirect server drain after a callback arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// OpenID discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnownInfo {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query parameters Intuit sends back to the redirect URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: String,
    pub realm_id: Option<String>,
}

pub struct QboAuth {
    config: QboConfig,
    client: Client,
}

impl QboAuth {
    pub fn new(config: QboConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &QboConfig {
        &self.config
    }

    /// Random opaque value for the `state` parameter.
    pub fn new_state() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Fetch the discovery document from the configured well-known URL.
    pub async fn discover(&self) -> ApiResult<WellKnownInfo> {
        let url = require(&self.config.well_known_url, QboConfig::WELL_KNOWN_URL_VAR)?;
        tracing::debug!(url, "Fetching QBO discovery document");
        send_json(self.client.get(url), "discovery document").await
    }

    /// Consent URL the user opens in a browser.
    pub fn authorization_url(
        &self,
        discovery: &WellKnownInfo,
        state: &str,
    ) -> Result<Url, ClientError> {
        let client_id = require(&self.config.client_id, QboConfig::CLIENT_ID_VAR)?;
        let redirect_url = require(&self.config.redirect_url, QboConfig::REDIRECT_URL_VAR)?;

        let mut url = Url::parse(&discovery.authorization_endpoint).map_err(|e| {
            ClientError::validation(format!(
                "invalid authorization endpoint {}: {e}",
                discovery.authorization_endpoint
            ))
        })?;
        QueryParams::new()
            .with("client_id", client_id)
            .with("redirect_uri", redirect_url)
            .with("response_type", "code")
            .with("scope", self.config.scope.as_str())
            .with("state", state)
            .apply(&mut url);
        Ok(url)
    }

    fn client_secret(&self) -> Result<(&str, SecretString), ClientError> {
        let client_id = require(&self.config.client_id, QboConfig::CLIENT_ID_VAR)?;
        let secret = require(&self.config.client_secret, QboConfig::CLIENT_SECRET_VAR)?;
        Ok((client_id, SecretString::from(secret.to_string())))
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        discovery: &WellKnownInfo,
        code: &str,
    ) -> ApiResult<TokenResponse> {
        let (client_id, secret) = self.client_secret()?;
        let redirect_url = require(&self.config.redirect_url, QboConfig::REDIRECT_URL_VAR)?;
        let grant = TokenGrant::AuthorizationCode {
            code: code.to_string(),
            redirect_uri: redirect_url.to_string(),
        };

        let tokens = request_token(
            &self.client,
            &discovery.token_endpoint,
            client_id,
            &secret,
            &grant,
        )
        .await?;
        tracing::info!(environment = %self.config.environment, "Exchanged QBO authorization code");
        Ok(tokens)
    }

    /// Refresh an access token. QBO may rotate the refresh token; callers
    /// should persist `refresh_token` from the response when present.
    pub async fn refresh(
        &self,
        discovery: &WellKnownInfo,
        refresh_token: SecretString,
    ) -> ApiResult<TokenResponse> {
        let (client_id, secret) = self.client_secret()?;
        let grant = TokenGrant::RefreshToken { refresh_token };

        let tokens = request_token(
            &self.client,
            &discovery.token_endpoint,
            client_id,
            &secret,
            &grant,
        )
        .await?;
        tracing::info!(
            environment = %self.config.environment,
            rotated = tokens.model.refresh_token.is_some(),
            "Refreshed QBO access token"
        );
        Ok(tokens)
    }

    /// Socket address the redirect listener should bind, taken from
    /// `local_redirect_url` or else `redirect_url`.
    pub fn redirect_bind_addr(&self) -> Result<String, ClientError> {
        let raw = match require(
            &self.config.local_redirect_url,
            QboConfig::LOCAL_REDIRECT_URL_VAR,
        ) {
            Ok(local) => local,
            Err(_) => require(&self.config.redirect_url, QboConfig::REDIRECT_URL_VAR)?,
        };
        let url = Url::parse(raw)
            .map_err(|e| ClientError::validation(format!("invalid redirect URL {raw}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::validation(format!("redirect URL has no host: {raw}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ClientError::validation(format!("redirect URL has no port: {raw}")))?;
        Ok(format!("{host}:{port}"))
    }

    /// Bind `bind_addr` and wait for the OAuth redirect.
    pub async fn await_redirect(
        &self,
        bind_addr: &str,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<AuthorizationCallback, ClientError> {
        let listener = RedirectListener::bind(bind_addr).await?;
        listener.wait(expected_state, timeout).await
    }

    /// Assemble request credentials from a token response and the
    /// configured base URL, realm and minor version.
    pub fn credentials_from_tokens(
        &self,
        tokens: &TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<ApiCredentials, ClientError> {
        let base_url = require(&self.config.base_url, QboConfig::BASE_URL_VAR)?;
        let realm_id = require(&self.config.realm_id, QboConfig::REALM_ID_VAR)?;

        let mut creds = ApiCredentials::new(
            SecretString::from(tokens.access_token.clone()),
            base_url,
            realm_id,
        );
        if let Some(refresh_token) = &tokens.refresh_token {
            creds = creds.with_refresh_token(SecretString::from(refresh_token.clone()));
        }
        if let Some(minor_version) = self.config.minor_version.as_deref() {
            creds = creds.with_minor_version(minor_version);
        }
        if let Some(expires_at) = tokens.expires_at(now) {
            creds = creds.with_expires_at(expires_at);
        }
        Ok(creds)
    }
}

/// Query parameters on a redirect request.
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    #[serde(rename = "realmId")]
    realm_id: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type CallbackResult = Result<AuthorizationCallback, ClientError>;

struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

/// One-shot HTTP listener for the OAuth redirect.
pub struct RedirectListener {
    listener: TcpListener,
}

impl RedirectListener {
    pub async fn bind(addr: &str) -> Result<Self, ClientError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until a request carries an authorization callback.
    ///
    /// Requests without `code`, `state` or `error` (favicon fetches and the
    /// like) get a 404 and are skipped.
    pub async fn wait(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<AuthorizationCallback, ClientError> {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected_state: expected_state.to_string(),
            sender: Mutex::new(Some(sender)),
        });
        let router = Router::new()
            .route("/", get(handle_callback))
            .route("/{*path}", get(handle_callback))
            .with_state(state);

        tracing::info!(
            addr = ?self.listener.local_addr().ok(),
            "Waiting for QBO authorization redirect"
        );
        let (shutdown, shutdown_signal) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(self.listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_signal.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, receiver).await;
        let _ = shutdown.send(());
        // Idle browser connections can hold graceful shutdown open.
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Err(err))) => tracing::debug!(error = %err, "Redirect server stopped with error"),
            Ok(Err(err)) => tracing::debug!(error = %err, "Redirect server task failed"),
            Ok(Ok(Ok(()))) | Err(_) => {}
        }

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Io(std::io::Error::other(
                "redirect listener stopped before a callback arrived",
            ))),
            Err(_) => Err(ClientError::Timeout(format!(
                "authorization redirect after {timeout:?}"
            ))),
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let result = match interpret_callback(query, &state.expected_state) {
        Ok(Some(callback)) => Ok(callback),
        Ok(None) => return (StatusCode::NOT_FOUND, "Not Found").into_response(),
        Err(err) => Err(err),
    };

    let response = match &result {
        Ok(_) => Html(CALLBACK_PAGE).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    match state.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => tracing::debug!("Ignoring repeated authorization redirect"),
    }
    response
}

/// Interpret redirect parameters. `Ok(None)` means it is not a callback.
fn interpret_callback(
    query: CallbackQuery,
    expected_state: &str,
) -> Result<Option<AuthorizationCallback>, ClientError> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(ClientError::validation(format!(
            "authorization denied: {error} {description}"
        )));
    }

    let (code, state) = match (query.code, query.state) {
        (Some(code), Some(state)) => (code, state),
        (None, None) => return Ok(None),
        _ => {
            return Err(ClientError::validation(
                "authorization redirect is missing code or state",
            ))
        }
    };
    if state != expected_state {
        return Err(ClientError::validation("authorization state mismatch"));
    }

    Ok(Some(AuthorizationCallback {
        code,
        state,
        realm_id: query.realm_id,
    }))
}
