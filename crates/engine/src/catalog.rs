//! Catalog records and field resolution.
//!
//! The catalog API does not fix its key casing: the same product may arrive as
//! `{"Id": 1, "Name": ..., "CurrentUnitPrice": ..., "StockQuantity": ...}` or
//! `{"id": 1, "name": ..., "price": ..., "stock": ...}`. Each field therefore
//! resolves through an ordered list of spellings; the first spelling present
//! with a usable value wins, and an unresolved field falls back to its
//! default (no identity, empty name, zero price, zero stock).
//!
//! Every accessor goes through [`CatalogProduct::resolve`]; nothing else in
//! the engine reads raw product fields.

use std::str::FromStr;

use cartwright_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Spellings of the product identifier, in priority order.
pub const ID_FIELDS: &[&str] = &["Id", "id"];
/// Spellings of the display name, in priority order.
pub const NAME_FIELDS: &[&str] = &["Name", "name"];
/// Spellings of the unit price, in priority order.
pub const PRICE_FIELDS: &[&str] = &["CurrentUnitPrice", "price"];
/// Spellings of the stock quantity, in priority order.
pub const STOCK_FIELDS: &[&str] = &["StockQuantity", "stockQuantity", "stock"];

/// A product record as delivered by the catalog, read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogProduct(Value);

impl CatalogProduct {
    /// Wrap a raw catalog record.
    #[must_use]
    pub const fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Resolve a field through its spellings.
    ///
    /// Spellings are tried in order; `null` values and values `convert`
    /// rejects are skipped.
    pub fn resolve<T>(&self, fields: &[&str], convert: impl Fn(&Value) -> Option<T>) -> Option<T> {
        fields
            .iter()
            .filter_map(|field| self.0.get(*field))
            .filter(|value| !value.is_null())
            .find_map(convert)
    }

    /// Product identifier, if the record has one.
    #[must_use]
    pub fn id(&self) -> Option<ProductId> {
        self.resolve(ID_FIELDS, ProductId::from_json)
    }

    /// Display name, empty when unresolved.
    #[must_use]
    pub fn name(&self) -> String {
        self.resolve(NAME_FIELDS, |v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Unit price, zero when unresolved.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.resolve(PRICE_FIELDS, decimal_from_json)
            .unwrap_or_default()
    }

    /// Units in stock, zero when unresolved. Negative stock reads as zero.
    #[must_use]
    pub fn stock(&self) -> u32 {
        self.resolve(STOCK_FIELDS, count_from_json).unwrap_or(0)
    }

    /// Case-insensitive substring match on the resolved name.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty() || self.name().to_lowercase().contains(&term)
    }
}

impl From<Value> for CatalogProduct {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

/// Parameters of a catalog page request (`GET /api/products`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub page_number: u32,
    pub page_size: u32,
}

impl CatalogQuery {
    /// First page of the unfiltered catalog.
    #[must_use]
    pub const fn first_page(page_size: u32) -> Self {
        Self {
            search: None,
            page_number: 1,
            page_size,
        }
    }
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self::first_page(12)
    }
}

/// Extract product records from a catalog response body.
///
/// Accepts a bare array or an object with an `items` array. Any other shape
/// yields an empty catalog. Non-object entries are skipped.
#[must_use]
pub fn parse_catalog(body: Value) -> Vec<CatalogProduct> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("items") {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("Catalog response object has no items array");
                Vec::new()
            }
        },
        other => {
            warn!(kind = %json_kind(&other), "Unexpected catalog response shape");
            Vec::new()
        }
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .map(CatalogProduct)
        .collect()
}

/// Products whose names match `term`, in catalog order.
#[must_use]
pub fn filter_by_name<'a>(products: &'a [CatalogProduct], term: &str) -> Vec<&'a CatalogProduct> {
    products.iter().filter(|p| p.matches_search(term)).collect()
}

fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range first
fn count_from_json(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(u32::try_from(i.max(0)).unwrap_or(u32::MAX))
            } else if let Some(u) = n.as_u64() {
                Some(u32::try_from(u).unwrap_or(u32::MAX))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.floor().clamp(0.0, f64::from(u32::MAX)) as u32)
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .map(|i| u32::try_from(i.max(0)).unwrap_or(u32::MAX)),
        _ => None,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
