//! Cart and cart line types.
//!
//! A [`Cart`] is an ordered list of [`CartLine`]s with two invariants:
//! product IDs are unique, and every quantity is at least one. Mutating
//! methods preserve both; [`Cart::validate`] checks data that arrived from
//! outside (durable storage written by another tab or an older build).

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;

/// Invariant violations detected in a decoded cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartInvariantError {
    #[error("duplicate line for product {0}")]
    DuplicateProduct(ProductId),
    #[error("line for product {0} has zero quantity")]
    ZeroQuantity(ProductId),
}

/// Reasons a serialized cart could not be turned back into a [`Cart`].
#[derive(Debug, Error)]
pub enum CartDecodeError {
    #[error("malformed cart JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid cart: {0}")]
    Invariant(#[from] CartInvariantError),
}

/// One product-and-quantity entry in the cart.
///
/// Serialized in camelCase to match the durable storage layout
/// (`productId`, `name`, `unitPrice`, `quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// Create a new cart line.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Price of the whole line. Computed on demand, never stored.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Ordered sequence of cart lines, insertion order preserved for display.
///
/// Serializes as a bare JSON array of lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from lines, checking its invariants.
    ///
    /// # Errors
    ///
    /// Returns `CartInvariantError` if two lines share a product or a line has
    /// zero quantity.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CartInvariantError> {
        let cart = Self { lines };
        cart.validate()?;
        Ok(cart)
    }

    /// Decode a cart from its durable JSON representation.
    ///
    /// # Errors
    ///
    /// Returns `CartDecodeError` if the JSON is malformed or the decoded
    /// lines break a cart invariant.
    pub fn from_json(raw: &str) -> Result<Self, CartDecodeError> {
        let cart: Self = serde_json::from_str(raw)?;
        cart.validate()?;
        Ok(cart)
    }

    /// Encode the cart for durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (it cannot for well-formed
    /// decimals, but the signature mirrors `serde_json`).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Check the uniqueness and minimum-quantity invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, in line order.
    pub fn validate(&self) -> Result<(), CartInvariantError> {
        let mut seen = HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(CartInvariantError::ZeroQuantity(line.product_id.clone()));
            }
            if !seen.insert(&line.product_id) {
                return Err(CartInvariantError::DuplicateProduct(
                    line.product_id.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == product_id)
    }

    /// Committed quantity of a product, zero when it has no line.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |line| line.quantity)
    }

    /// Total units across all lines (the badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Insert a line, or replace the existing line for the same product in
    /// place so display order is kept.
    ///
    /// A line with zero quantity removes the product instead, so the
    /// minimum-quantity invariant holds.
    pub fn put_line(&mut self, line: CartLine) {
        if line.quantity == 0 {
            self.remove(&line.product_id);
            return;
        }
        match self
            .lines
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    /// Set the quantity of an existing line.
    ///
    /// Zero removes the line. Returns `false` when the product has no line.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id).is_some();
        }
        match self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove the line for a product, returning it if present.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<CartLine> {
        let index = self
            .lines
            .iter()
            .position(|line| &line.product_id == product_id)?;
        Some(self.lines.remove(index))
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn line(id: &str, price: &str, quantity: u32) -> CartLine {
        CartLine::new(
            ProductId::from(id),
            format!("Product {id}"),
            Decimal::from_str(price).unwrap(),
            quantity,
        )
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let cart = Cart::from_lines(vec![line("p1", "19.99", 3), line("p2", "5", 1)]).unwrap();

        let encoded = cart.to_json().unwrap();
        let decoded = Cart::from_json(&encoded).unwrap();

        assert_eq!(decoded, cart);
        assert_eq!(decoded.to_json().unwrap(), encoded);
    }

    #[test]
    fn test_decodes_numeric_prices_and_ids() {
        let raw = r#"[{"productId":12,"name":"Mate","unitPrice":1500.5,"quantity":2}]"#;
        let cart = Cart::from_json(raw).unwrap();

        let line = cart.line(&ProductId::from(12_i64)).unwrap();
        assert_eq!(line.unit_price, Decimal::from_str("1500.5").unwrap());
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_decode_rejects_duplicates_and_zero_quantities() {
        let duplicate = r#"[
            {"productId":"p1","name":"A","unitPrice":"1","quantity":1},
            {"productId":"p1","name":"A","unitPrice":"1","quantity":2}
        ]"#;
        assert!(matches!(
            Cart::from_json(duplicate),
            Err(CartDecodeError::Invariant(
                CartInvariantError::DuplicateProduct(_)
            ))
        ));

        let zero = r#"[{"productId":"p1","name":"A","unitPrice":"1","quantity":0}]"#;
        assert!(matches!(
            Cart::from_json(zero),
            Err(CartDecodeError::Invariant(CartInvariantError::ZeroQuantity(_)))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Cart::from_json("{not json"),
            Err(CartDecodeError::Json(_))
        ));
        assert!(matches!(
            Cart::from_json(r#"{"items":[]}"#),
            Err(CartDecodeError::Json(_))
        ));
    }

    #[test]
    fn test_put_line_replaces_in_place() {
        let mut cart = Cart::new();
        cart.put_line(line("p1", "1", 1));
        cart.put_line(line("p2", "1", 1));
        cart.put_line(line("p1", "1", 4));

        let ids: Vec<_> = cart.lines().iter().map(|l| l.product_id.to_string()).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(cart.quantity_of(&ProductId::from("p1")), 4);
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = Cart::from_lines(vec![line("p1", "1", 2)]).unwrap();

        assert!(cart.set_quantity(&ProductId::from("p1"), 0));
        assert!(cart.is_empty());

        cart.put_line(line("p2", "1", 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals() {
        let cart = Cart::from_lines(vec![line("p1", "2.50", 4), line("p2", "10", 1)]).unwrap();

        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.subtotal(), Decimal::from(20));
        assert_eq!(cart.lines()[0].line_total(), Decimal::from(10));
    }

    #[test]
    fn test_quantity_of_missing_product_is_zero() {
        let cart = Cart::new();
        assert_eq!(cart.quantity_of(&ProductId::from("nope")), 0);

        let mut empty = Cart::new();
        assert!(!empty.set_quantity(&ProductId::from("nope"), 3));
    }
}
