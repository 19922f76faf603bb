use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::deserialize_duration_opt;
use crate::error::ClientError;

/// Default OAuth scope requested from QBO.
fn default_qbo_scope() -> String {
    "com.intuit.quickbooks.accounting".to_string()
}

/// Default QBO environment name.
fn default_qbo_environment() -> String {
    "production".to_string()
}

/// Default Ramp page size (the API accepts 2-100).
fn default_page_size() -> u32 {
    100
}

/// Return the value if it is present and non-blank, otherwise a
/// configuration error named after `var`.
pub fn require<'a>(value: &'a Option<String>, var: &'static str) -> Result<&'a str, ClientError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ClientError::not_set(var)),
    }
}

/// Ramp developer API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Space-separated OAuth scopes, e.g. "cards:read users:read".
    pub scope: Option<String>,
    /// Page size used when walking collections.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl RampConfig {
    pub const BASE_URL_VAR: &'static str = "RAMP_PROD_API_BASE_URL";
    pub const CLIENT_ID_VAR: &'static str = "RAMP_PROD_API_CLIENT_ID";
    pub const CLIENT_SECRET_VAR: &'static str = "RAMP_PROD_API_CLIENT_SECRET";
    pub const SCOPE_VAR: &'static str = "RAMP_PROD_API_SCOPE";

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        override_from(&mut self.base_url, lookup, Self::BASE_URL_VAR);
        override_from(&mut self.client_id, lookup, Self::CLIENT_ID_VAR);
        override_from(&mut self.client_secret, lookup, Self::CLIENT_SECRET_VAR);
        override_from(&mut self.scope, lookup, Self::SCOPE_VAR);
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            client_id: None,
            client_secret: None,
            scope: None,
            page_size: default_page_size(),
        }
    }
}

/// QuickBooks Online settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QboConfig {
    /// API base URL, e.g. "https://quickbooks.api.intuit.com".
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// "sandbox" or "production"; also names the cached refresh token.
    #[serde(default = "default_qbo_environment")]
    pub environment: String,
    pub minor_version: Option<String>,
    pub realm_id: Option<String>,
    /// Redirect URL registered with Intuit.
    pub redirect_url: Option<String>,
    /// Local address the redirect listener binds to, when it differs from
    /// `redirect_url` (e.g. behind a tunnel).
    pub local_redirect_url: Option<String>,
    /// OpenID discovery document URL.
    pub well_known_url: Option<String>,
    #[serde(default = "default_qbo_scope")]
    pub scope: String,
    /// Per-request timeout for report fetches. Unset means no timeout.
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub report_timeout: Option<Duration>,
}

impl QboConfig {
    pub const BASE_URL_VAR: &'static str = "QBO_BASE_URL";
    pub const CLIENT_ID_VAR: &'static str = "QBO_CLIENT_ID";
    pub const CLIENT_SECRET_VAR: &'static str = "QBO_CLIENT_SECRET";
    pub const ENVIRONMENT_VAR: &'static str = "QBO_ENVIRONMENT";
    pub const LOCAL_REDIRECT_URL_VAR: &'static str = "QBO_LOCAL_REDIRECT_URL";
    pub const MINOR_VERSION_VAR: &'static str = "QBO_MINOR_VERSION";
    pub const REALM_ID_VAR: &'static str = "QBO_REALM_ID";
    pub const REDIRECT_URL_VAR: &'static str = "QBO_REDIRECT_URL";
    pub const WELL_KNOWN_URL_VAR: &'static str = "QBO_WELL_KNOWN_URL";

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        override_from(&mut self.base_url, lookup, Self::BASE_URL_VAR);
        override_from(&mut self.client_id, lookup, Self::CLIENT_ID_VAR);
        override_from(&mut self.client_secret, lookup, Self::CLIENT_SECRET_VAR);
        override_from(&mut self.minor_version, lookup, Self::MINOR_VERSION_VAR);
        override_from(&mut self.realm_id, lookup, Self::REALM_ID_VAR);
        override_from(&mut self.redirect_url, lookup, Self::REDIRECT_URL_VAR);
        override_from(
            &mut self.local_redirect_url,
            lookup,
            Self::LOCAL_REDIRECT_URL_VAR,
        );
        override_from(&mut self.well_known_url, lookup, Self::WELL_KNOWN_URL_VAR);
        if let Some(env) = lookup(Self::ENVIRONMENT_VAR).filter(|v| !v.trim().is_empty()) {
            self.environment = env;
        }
    }

    /// Key under which the rotating refresh token is cached.
    pub fn refresh_token_key(&self) -> String {
        format!("qbo_refresh_token.{}", self.environment)
    }
}

impl Default for QboConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            client_id: None,
            client_secret: None,
            environment: default_qbo_environment(),
            minor_version: None,
            realm_id: None,
            redirect_url: None,
            local_redirect_url: None,
            well_known_url: None,
            scope: default_qbo_scope(),
            report_timeout: None,
        }
    }
}

/// Where cached tokens live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Directory for token files. Relative paths resolve from the config
    /// file's directory. Defaults to the user cache directory.
    pub dir: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ramp: RampConfig,
    pub qbo: QboConfig,
    pub tokens: TokenConfig,
}

fn override_from(slot: &mut Option<String>, lookup: &impl Fn(&str) -> Option<String>, var: &str) {
    if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay values from an environment-like lookup. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.ramp.apply_env(&lookup);
        self.qbo.apply_env(&lookup);
    }

    /// Load the file (if any), then overlay the process environment.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Resolve the token directory.
    ///
    /// Relative paths are resolved against `config_dir`; unset falls back to
    /// `~/.cache/ledgerlink/tokens`.
    pub fn resolve_token_dir(&self, config_dir: &Path) -> Result<PathBuf> {
        match &self.tokens.dir {
            Some(dir) if dir.is_absolute() => Ok(dir.clone()),
            Some(dir) => Ok(config_dir.join(dir)),
            None => Ok(dirs::cache_dir()
                .context("Could not find cache directory")?
                .join("ledgerlink")
                .join("tokens")),
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./ledgerlink.toml` if it exists in current directory
/// 2. `~/.local/share/ledgerlink/ledgerlink.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("ledgerlink.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("ledgerlink").join("ledgerlink.toml");
    }

    local_config
}
