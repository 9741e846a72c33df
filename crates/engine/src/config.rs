//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CARTWRIGHT_API_URL` - Base URL of the storefront REST API (required for
//!   catalog, order and login calls)
//! - `CARTWRIGHT_API_TOKEN` - Static bearer token, used when no session
//!   credential is stored
//! - `CARTWRIGHT_LOGIN_PATH` - Login endpoint path (default: /api/auth/login)
//! - `CARTWRIGHT_STORAGE_PATH` - Profile file for the file-backed storage
//!   (default: .cartwright/profile.json)
//! - `CARTWRIGHT_DECREMENT_POLICY` - `floor_at_one` or `remove_at_zero`
//!   (default: `floor_at_one`)
//! - `CARTWRIGHT_CATALOG_TTL_SECS` - Catalog cache lifetime (default: 30)
//! - `CARTWRIGHT_CATALOG_PAGE_SIZE` - Catalog page size (default: 12)
//! - `CARTWRIGHT_EVENT_CAPACITY` - Broadcast buffer per topic (default: 64)
//! - `CARTWRIGHT_LOG_JSON` - Emit JSON logs when `true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use cartwright_core::DecrementPolicy;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::store::StorageKeys;

const DEFAULT_STORAGE_PATH: &str = ".cartwright/profile.json";
const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";
const DEFAULT_CATALOG_TTL_SECS: u64 = 30;
const DEFAULT_CATALOG_PAGE_SIZE: u32 = 12;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct EngineConfig {
    /// Base URL of the storefront REST API
    pub api_url: Option<Url>,
    /// Static bearer token for API calls
    pub api_token: Option<SecretString>,
    /// Path of the login endpoint, relative to `api_url`
    pub login_path: String,
    /// Profile file used by file-backed storage
    pub storage_path: PathBuf,
    /// Durable slot names
    pub keys: StorageKeys,
    /// Behavior when a committed line is decremented below one
    pub decrement_policy: DecrementPolicy,
    /// How long catalog pages stay cached
    pub catalog_ttl: Duration,
    /// Products requested per catalog page
    pub catalog_page_size: u32,
    /// Buffered events per broadcast topic
    pub event_capacity: usize,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_url", &self.api_url.as_ref().map(Url::as_str))
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("login_path", &self.login_path)
            .field("storage_path", &self.storage_path)
            .field("keys", &self.keys)
            .field("decrement_policy", &self.decrement_policy)
            .field("catalog_ttl", &self.catalog_ttl)
            .field("catalog_page_size", &self.catalog_page_size)
            .field("event_capacity", &self.event_capacity)
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            keys: StorageKeys::default(),
            decrement_policy: DecrementPolicy::default(),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            catalog_page_size: DEFAULT_CATALOG_PAGE_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("CARTWRIGHT_API_URL")
            .map(|raw| parse_api_url("CARTWRIGHT_API_URL", &raw))
            .transpose()?;

        let decrement_policy = match lookup("CARTWRIGHT_DECREMENT_POLICY") {
            Some(raw) => raw
                .parse::<DecrementPolicy>()
                .map_err(|e| invalid("CARTWRIGHT_DECREMENT_POLICY", e))?,
            None => defaults.decrement_policy,
        };

        let catalog_ttl = parse_or(
            &lookup,
            "CARTWRIGHT_CATALOG_TTL_SECS",
            DEFAULT_CATALOG_TTL_SECS,
        )
        .map(Duration::from_secs)?;

        let catalog_page_size = parse_or(
            &lookup,
            "CARTWRIGHT_CATALOG_PAGE_SIZE",
            DEFAULT_CATALOG_PAGE_SIZE,
        )?;
        if catalog_page_size == 0 {
            return Err(invalid("CARTWRIGHT_CATALOG_PAGE_SIZE", "must be at least 1"));
        }

        let event_capacity = parse_or(&lookup, "CARTWRIGHT_EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY)?;
        if event_capacity == 0 {
            return Err(invalid("CARTWRIGHT_EVENT_CAPACITY", "must be at least 1"));
        }

        Ok(Self {
            api_url,
            api_token: lookup("CARTWRIGHT_API_TOKEN")
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
            login_path: lookup("CARTWRIGHT_LOGIN_PATH").unwrap_or(defaults.login_path),
            storage_path: lookup("CARTWRIGHT_STORAGE_PATH")
                .map_or(defaults.storage_path, PathBuf::from),
            keys: defaults.keys,
            decrement_policy,
            catalog_ttl,
            catalog_page_size,
            event_capacity,
            log_json: lookup("CARTWRIGHT_LOG_JSON")
                .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes")),
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }

    /// The API base URL, or an error naming the variable to set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when no API URL is configured.
    pub fn require_api_url(&self) -> Result<&Url, ConfigError> {
        self.api_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTWRIGHT_API_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

/// Parse the API base URL; only http(s) URLs are accepted.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(key, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(key, format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

/// Parse a variable, falling back to `default` when it is unset.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim().parse::<T>().map_err(|e| invalid(key, e))
    })
}
