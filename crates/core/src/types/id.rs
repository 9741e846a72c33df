//! Identifier types for cart entities.
//!
//! The remote catalog hands out product identifiers as either JSON numbers or
//! strings depending on the endpoint, so [`ProductId`] keeps whichever shape
//! it was given and serializes it back unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a catalog product.
///
/// Numeric and textual identifiers never compare equal: `1` and `"1"` are
/// different products as far as the cart is concerned.
///
/// # Example
///
/// ```rust
/// # use cartwright_core::ProductId;
/// let numeric = ProductId::from(42_i64);
/// let text = ProductId::from("p1");
///
/// assert_eq!(numeric.to_string(), "42");
/// assert_eq!(text.to_string(), "p1");
/// assert_ne!(ProductId::from(1_i64), ProductId::from("1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    /// Integer identifier (e.g. a database key).
    Numeric(i64),
    /// Opaque string identifier.
    Text(String),
}

impl ProductId {
    /// Build an identifier from a JSON value.
    ///
    /// Accepts integers and non-empty strings; anything else has no identity.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Numeric),
            serde_json::Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Identifier of the authenticated customer, as issued by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Create a new customer ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one open tab within a storage profile.
///
/// Storage change notifications carry the writing tab so that a tab never
/// receives its own writes as foreign changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(Uuid);

impl TabId {
    /// Generate a fresh tab identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
