//! OAuth2 token-endpoint requests.
//!
//! Ramp uses the client-credentials grant; QBO uses authorization-code and
//! refresh-token grants. All three POST a URL-encoded form authenticated with
//! HTTP Basic built from the client id and secret.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::http::send_json;

/// The grant presented to a token endpoint.
#[derive(Debug)]
pub enum TokenGrant {
    ClientCredentials { scope: String },
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: SecretString },
}

impl TokenGrant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::ClientCredentials { .. } => "client_credentials",
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("grant_type", self.grant_type().to_string())];
        match self {
            Self::ClientCredentials { scope } => form.push(("scope", scope.clone())),
            Self::AuthorizationCode { code, redirect_uri } => {
                form.push(("code", code.clone()));
                form.push(("redirect_uri", redirect_uri.clone()));
            }
            Self::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token.expose_secret().to_string()));
            }
        }
        form
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token, in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// QBO only: lifetime of the refresh token, in seconds.
    #[serde(default)]
    pub x_refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry of the access token, if the endpoint reported one
    /// and it is representable.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = self.expires_in?;
        let expires_at = TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d));
        if expires_at.is_none() {
            tracing::warn!(expires_in = secs, "Ignoring out-of-range token lifetime");
        }
        expires_at
    }
}

/// POST `grant` to `token_url`.
pub async fn request_token(
    http: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &SecretString,
    grant: &TokenGrant,
) -> ApiResult<TokenResponse> {
    tracing::debug!(grant_type = grant.grant_type(), url = token_url, "Requesting OAuth token");

    let request = http
        .post(token_url)
        .basic_auth(client_id, Some(client_secret.expose_secret()))
        .form(&grant.form());

    send_json(request, "token response").await
}
