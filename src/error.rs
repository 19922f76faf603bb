//! Error and result types shared by the Ramp and QBO clients.
//!
//! Every outbound call returns [`ApiResult`]: either the decoded model plus the
//! response headers, or a [`ClientError`] describing why no model is available.

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// HTTP-like status reported for configuration errors.
pub const CONFIG_ERROR_STATUS: u16 = 500;

/// A successful API response.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub model: T,
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    pub fn new(model: T, headers: HeaderMap) -> Self {
        Self { model, headers }
    }

    /// Map the model, keeping the headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            model: f(self.model),
            headers: self.headers,
        }
    }

    pub fn into_model(self) -> T {
        self.model
    }
}

/// Result of a single API call.
pub type ApiResult<T> = Result<ApiResponse<T>, ClientError>;

/// Vendor error body with the observed HTTP status attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: String,
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatErrorBody {
    error_code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    additional_info: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QboFaultBody {
    fault: QboFault,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QboFault {
    #[serde(default)]
    error: Vec<QboFaultError>,
    #[serde(default, rename = "type")]
    fault_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QboFaultError {
    #[serde(default, rename = "Message")]
    message: String,
    #[serde(default, rename = "Detail")]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ApiError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            status,
            additional_info: None,
            notes: None,
        }
    }

    /// Decode a vendor error body, attaching the HTTP status.
    ///
    /// Understands Ramp (`error_v2` envelope or flat), QBO `Fault` and OAuth
    /// token-endpoint bodies. Anything else keeps the raw text as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return Self::new(format!("HTTP_{status}"), body.trim(), status),
        };

        let flat = value.get("error_v2").unwrap_or(&value);
        if let Ok(flat) = serde_json::from_value::<FlatErrorBody>(flat.clone()) {
            return Self {
                error_code: flat.error_code,
                message: flat.message,
                status,
                additional_info: flat.additional_info,
                notes: flat.notes,
            };
        }

        if let Ok(QboFaultBody { fault }) = serde_json::from_value::<QboFaultBody>(value.clone()) {
            let first = fault.error.into_iter().next();
            let (code, message) = match first {
                Some(e) => {
                    let message = match e.detail {
                        Some(detail) if !detail.is_empty() => format!("{}: {detail}", e.message),
                        _ => e.message,
                    };
                    (e.code.or(fault.fault_type), message)
                }
                None => (fault.fault_type, String::new()),
            };
            return Self::new(
                code.unwrap_or_else(|| format!("HTTP_{status}")),
                message,
                status,
            );
        }

        if let Ok(oauth) = serde_json::from_value::<OAuthErrorBody>(value.clone()) {
            return Self::new(
                oauth.error,
                oauth.error_description.unwrap_or_default(),
                status,
            );
        }

        Self::new(format!("HTTP_{status}"), value.to_string(), status)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.error_code, self.status, self.message)
    }
}

/// Everything that can go wrong talking to a vendor API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required configuration value is absent.
    #[error("{name} is not set")]
    NotSet { name: &'static str },

    /// The vendor answered with a non-2xx status.
    #[error("API request failed: {0}")]
    Api(ApiError),

    /// Caller-supplied parameters are malformed.
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// A report body could not be turned into a parsed report.
    #[error("Error parsing {endpoint} report: {message}")]
    Parse { endpoint: String, message: String },

    /// A 2xx body did not match the expected model.
    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A pagination link without a `start` parameter.
    #[error("No 'start' parameter found in pagination URL: {next}")]
    Pagination { next: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl ClientError {
    pub fn not_set(name: &'static str) -> Self {
        Self::NotSet { name }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Machine-readable code in the vendor-error style.
    pub fn error_code(&self) -> String {
        match self {
            Self::NotSet { name } => format!("{name}_NOT_SET"),
            Self::Api(err) => err.error_code.clone(),
            Self::Validation(_) => "INVALID_PARAMETERS".to_string(),
            Self::Parse { .. } => "REPORT_PARSE_ERROR".to_string(),
            Self::Decode { .. } => "DECODE_ERROR".to_string(),
            Self::Pagination { .. } => "PAGINATION_ERROR".to_string(),
            Self::Transport(_) => "TRANSPORT_ERROR".to_string(),
            Self::Io(_) => "IO_ERROR".to_string(),
            Self::Timeout(_) => "TIMEOUT".to_string(),
        }
    }

    /// HTTP status, when one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotSet { .. } => Some(CONFIG_ERROR_STATUS),
            Self::Api(err) => Some(err.status),
            Self::Validation(_) => Some(400),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Render this error in the uniform `{error_code, message, status}` shape.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::Api(err) => err.clone(),
            other => ApiError::new(
                other.error_code(),
                other.to_string(),
                other.status().unwrap_or(CONFIG_ERROR_STATUS),
            ),
        }
    }
}
