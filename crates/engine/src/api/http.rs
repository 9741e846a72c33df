//! `reqwest` implementation of the storefront endpoints.
//!
//! Catalog pages are cached using `moka` for the configured TTL. Search
//! queries bypass the cache.

use std::sync::Arc;
use std::time::Duration;

use cartwright_core::OrderPayload;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, error, instrument};
use url::Url;

use super::{
    ApiError, CatalogApi, Credentials, LoginApi, LoginResponse, OrderApi, OrderReceipt,
};
use crate::catalog::{CatalogProduct, CatalogQuery, parse_catalog};
use crate::config::{ConfigError, EngineConfig};
use crate::storage::LocalStorage;

const PRODUCTS_PATH: &str = "api/products";
const ORDERS_PATH: &str = "api/orders";

/// Where the bearer credential for a request comes from.
#[derive(Clone, Default)]
pub enum TokenSource {
    /// Requests are sent without credentials.
    #[default]
    None,
    /// A fixed token, e.g. from configuration.
    Static(SecretString),
    /// The session credential in durable storage, read on every request so a
    /// login or logout in any tab applies immediately.
    Session {
        storage: LocalStorage,
        key: String,
        fallback: Option<SecretString>,
    },
}

impl TokenSource {
    /// The credential to send right now, if any.
    #[must_use]
    pub fn current(&self) -> Option<SecretString> {
        match self {
            Self::None => None,
            Self::Static(token) => Some(token.clone()),
            Self::Session {
                storage,
                key,
                fallback,
            } => match storage.get(key) {
                Ok(Some(token)) if !token.is_empty() => Some(SecretString::from(token)),
                Ok(_) => fallback.clone(),
                Err(e) => {
                    debug!(error = %e, "Session token unreadable");
                    fallback.clone()
                }
            },
        }
    }
}

// =============================================================================
// HttpApi
// =============================================================================

/// Client for the storefront REST API.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    products_url: Url,
    orders_url: Url,
    login_url: Url,
    tokens: TokenSource,
    catalog_cache: Cache<CatalogQuery, Vec<CatalogProduct>>,
}

impl HttpApi {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if an endpoint URL cannot be built.
    pub fn new(
        base_url: &Url,
        login_path: &str,
        tokens: TokenSource,
        catalog_ttl: Duration,
    ) -> Result<Self, ApiError> {
        let catalog_cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(catalog_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpApiInner {
                client: reqwest::Client::new(),
                products_url: endpoint(base_url, PRODUCTS_PATH)?,
                orders_url: endpoint(base_url, ORDERS_PATH)?,
                login_url: endpoint(base_url, login_path)?,
                tokens,
                catalog_cache,
            }),
        })
    }

    /// Create a client from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no API URL is configured or an endpoint URL
    /// cannot be built from it.
    pub fn from_config(config: &EngineConfig, tokens: TokenSource) -> Result<Self, ConfigError> {
        let base_url = config.require_api_url()?;
        Self::new(base_url, &config.login_path, tokens, config.catalog_ttl).map_err(|e| {
            ConfigError::InvalidEnvVar("CARTWRIGHT_API_URL".to_string(), e.to_string())
        })
    }

    /// Drop every cached catalog page.
    pub fn invalidate_catalog(&self) {
        self.inner.catalog_cache.invalidate_all();
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.inner.tokens.current() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

impl CatalogApi for HttpApi {
    #[instrument(skip(self), fields(page = query.page_number, size = query.page_size))]
    async fn list_products(&self, query: &CatalogQuery) -> Result<Vec<CatalogProduct>, ApiError> {
        let cacheable = query.search.is_none();
        if cacheable && let Some(products) = self.inner.catalog_cache.get(query).await {
            debug!("Cache hit for catalog page");
            return Ok(products);
        }

        let request = self
            .inner
            .client
            .get(self.inner.products_url.clone())
            .query(query);
        let text = read_body(self.authorized(request).send().await?).await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            error!(
                error = %e,
                body = %preview(&text, 500),
                "Failed to parse catalog response"
            );
            ApiError::Parse(e.to_string())
        })?;

        let products = parse_catalog(body);
        debug!(count = products.len(), "Fetched catalog page");

        if cacheable {
            self.inner
                .catalog_cache
                .insert(query.clone(), products.clone())
                .await;
        }
        Ok(products)
    }
}

impl OrderApi for HttpApi {
    #[instrument(skip(self, payload), fields(items = payload.order_items.len()))]
    async fn create_order(&self, payload: &OrderPayload) -> Result<OrderReceipt, ApiError> {
        let request = self
            .inner
            .client
            .post(self.inner.orders_url.clone())
            .json(payload);
        let text = read_body(self.authorized(request).send().await?).await?;

        // Any 2xx is a placed order, whatever the body says.
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(OrderReceipt::new(body))
    }
}

impl LoginApi for HttpApi {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
        });
        let response = self
            .inner
            .client
            .post(self.inner.login_url.clone())
            .json(&body)
            .send()
            .await?;
        let text = read_body(response).await?;

        // A bare token may come back as plain text rather than a JSON string.
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(LoginResponse::from_json(&body))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolve `path` under `base`, keeping any path prefix `base` carries.
fn endpoint(base: &Url, path: &str) -> Result<Url, ApiError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ApiError::Parse(format!("invalid endpoint '{path}': {e}")))
}

/// Read a response body, turning non-success statuses into errors.
async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        error!(
            status = %status,
            body = %preview(&text, 500),
            "Storefront API returned non-success status"
        );
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: preview(&text, 200),
        });
    }
    Ok(text)
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
