//! Remote storefront API.
//!
//! The engine consumes three endpoints, each behind a trait so cart logic can
//! run against in-memory fakes:
//!
//! - [`CatalogApi`] - product catalog read (`GET /api/products`)
//! - [`OrderApi`] - order creation (`POST /api/orders`)
//! - [`LoginApi`] - credential exchange (`POST /api/auth/login`)
//!
//! [`HttpApi`] implements all three over `reqwest`.

mod http;

pub use http::{HttpApi, TokenSource};

use std::future::Future;
use std::sync::Arc;

use cartwright_core::{CustomerId, OrderPayload};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{CatalogProduct, CatalogQuery};

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Server refused the credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request was understood but not accepted.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Username and password submitted at login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: Option<SecretString>,
    pub customer_id: Option<CustomerId>,
}

impl LoginResponse {
    /// Interpret a login response body.
    ///
    /// The body is either the bare token as a JSON string, or an object with
    /// `token` (falling back to `accessToken`) and an optional `customerId`.
    #[must_use]
    pub fn from_json(body: &Value) -> Self {
        match body {
            Value::String(token) => Self {
                token: non_empty(token).map(SecretString::from),
                customer_id: None,
            },
            Value::Object(fields) => {
                let token = ["token", "accessToken"]
                    .iter()
                    .filter_map(|key| fields.get(*key).and_then(Value::as_str))
                    .find_map(non_empty)
                    .map(SecretString::from);
                let customer_id = match fields.get("customerId") {
                    Some(Value::String(id)) => non_empty(id).map(CustomerId::new),
                    Some(Value::Number(id)) => Some(CustomerId::new(id.to_string())),
                    _ => None,
                };
                Self { token, customer_id }
            }
            _ => Self {
                token: None,
                customer_id: None,
            },
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Acknowledgement of a created order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    /// Response body as returned by the server (`Null` when empty).
    pub body: Value,
    pub submitted_at: DateTime<Utc>,
}

impl OrderReceipt {
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self {
            body,
            submitted_at: Utc::now(),
        }
    }
}

// =============================================================================
// Endpoint traits
// =============================================================================

/// Product catalog read.
pub trait CatalogApi: Send + Sync {
    /// Fetch one page of products.
    fn list_products(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = Result<Vec<CatalogProduct>, ApiError>> + Send;
}

/// Order creation. Any error is a total failure: nothing was ordered.
pub trait OrderApi: Send + Sync {
    fn create_order(
        &self,
        payload: &OrderPayload,
    ) -> impl Future<Output = Result<OrderReceipt, ApiError>> + Send;
}

/// Credential exchange.
pub trait LoginApi: Send + Sync {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;
}

impl<T: CatalogApi> CatalogApi for Arc<T> {
    fn list_products(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = Result<Vec<CatalogProduct>, ApiError>> + Send {
        (**self).list_products(query)
    }
}

impl<T: OrderApi> OrderApi for Arc<T> {
    fn create_order(
        &self,
        payload: &OrderPayload,
    ) -> impl Future<Output = Result<OrderReceipt, ApiError>> + Send {
        (**self).create_order(payload)
    }
}

impl<T: LoginApi> LoginApi for Arc<T> {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send {
        (**self).login(credentials)
    }
}
