//! Request helpers shared by the vendor clients.

use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResponse, ApiResult, ClientError};

/// A single query-parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    /// Booleans are always sent; strings and integers only when truthy.
    fn is_appendable(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(n) => *n != 0,
            Self::Bool(_) => true,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered query parameters that silently skip falsy values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_opt<V: Into<ParamValue>>(
        mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Replace any existing value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Pairs that will actually be sent.
    pub fn appendable(&self) -> impl Iterator<Item = (&str, String)> {
        self.pairs
            .iter()
            .filter(|(_, v)| v.is_appendable())
            .map(|(k, v)| (k.as_str(), v.render()))
    }

    /// Append the sendable pairs to `url`.
    pub fn apply(&self, url: &mut Url) {
        let mut pairs = self.appendable().peekable();
        if pairs.peek().is_none() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, &value);
        }
    }
}

/// Join a configured base URL with a path.
pub(crate) fn join_url(base: &str, path: &str) -> Result<Url, ClientError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|e| ClientError::validation(format!("invalid URL {raw}: {e}")))
}

/// Send a request and return the raw response body, mapping non-2xx
/// statuses to [`ClientError::Api`].
pub(crate) async fn send_text(request: RequestBuilder) -> ApiResult<String> {
    let response = request
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    let headers: HeaderMap = response.headers().clone();
    let body = response.text().await?;

    if !status.is_success() {
        let error = ApiError::from_body(status.as_u16(), &body);
        tracing::warn!(
            status = status.as_u16(),
            error_code = %error.error_code,
            "API request failed"
        );
        return Err(ClientError::Api(error));
    }

    Ok(ApiResponse::new(body, headers))
}

/// Send a request and decode a 2xx JSON body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    context: &str,
) -> ApiResult<T> {
    let response = send_text(request).await?;
    let model = serde_json::from_str(&response.model).map_err(|source| ClientError::Decode {
        context: context.to_string(),
        source,
    })?;
    Ok(ApiResponse::new(model, response.headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falsy_values_are_skipped_but_booleans_are_kept() {
        let params = QueryParams::new()
            .with("page_size", 100u32)
            .with("start", "")
            .with("offset", 0i64)
            .with("is_activated", false)
            .with("is_active", true)
            .with_opt::<&str>("department_id", None);

        let sent: Vec<(&str, String)> = params.appendable().collect();
        assert_eq!(
            sent,
            vec![
                ("page_size", "100".to_string()),
                ("is_activated", "false".to_string()),
                ("is_active", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_set_replaces_existing_value() {
        let mut params = QueryParams::new().with("start", "a");
        params.set("start", "b");
        assert_eq!(params.get("start"), Some(&ParamValue::Str("b".to_string())));
        params.remove("start");
        assert!(params.get("start").is_none());
    }

    #[test]
    fn test_apply_leaves_url_without_query_when_nothing_is_sent() {
        let mut url = Url::parse("https://api.example.com/developer/v1/cards").unwrap();
        QueryParams::new().with("start", "").apply(&mut url);
        assert_eq!(url.as_str(), "https://api.example.com/developer/v1/cards");

        QueryParams::new().with("page_size", 2u32).apply(&mut url);
        assert_eq!(
            url.as_str(),
            "https://api.example.com/developer/v1/cards?page_size=2"
        );
    }

    #[test]
    fn test_join_url_normalizes_slashes() {
        let url = join_url("https://api.example.com/", "/developer/v1/token").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/developer/v1/token");
    }
}
