//! Stock reconciliation.
//!
//! Stock is a catalog snapshot; the cart is the durable record of what the
//! shopper already claimed. Everything the UI may still add is derived from
//! the two, never cached.

use cartwright_core::Cart;

use crate::catalog::CatalogProduct;

/// Quantity of `product` currently in `cart`. Zero when absent or unidentified.
#[must_use]
pub fn quantity_in_cart(product: &CatalogProduct, cart: &Cart) -> u32 {
    product.id().map_or(0, |id| cart.quantity_of(&id))
}

/// Units of `product` that can still be added: `max(0, stock - in_cart)`.
///
/// A product without an identifier can never be added.
#[must_use]
pub fn available_to_add(product: &CatalogProduct, cart: &Cart) -> u32 {
    if product.id().is_none() {
        return 0;
    }
    product.stock().saturating_sub(quantity_in_cart(product, cart))
}

/// Parse free-form quantity input.
///
/// Reads an optional sign and the leading decimal digits after trimming,
/// ignoring anything that follows (`"3 units"` is 3). Input with no leading
/// digits, or a negative value, reads as 0. Oversized values saturate.
#[must_use]
pub fn parse_quantity(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let digits = rest.get(..end).unwrap_or_default();
    if digits.is_empty() || negative {
        return 0;
    }

    digits.bytes().fold(0_u32, |acc, d| {
        acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
    })
}

/// Clamp a requested quantity into `[0, available]`.
#[must_use]
pub fn clamp_quantity(requested: i64, available: u32) -> u32 {
    u32::try_from(requested.clamp(0, i64::from(available))).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{CartLine, ProductId};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn product(id: &str, stock: i64) -> CatalogProduct {
        CatalogProduct::new(json!({"id": id, "name": id, "price": 10, "stock": stock}))
    }

    fn cart_with(id: &str, quantity: u32) -> Cart {
        Cart::from_lines(vec![CartLine::new(
            ProductId::from(id),
            id,
            Decimal::TEN,
            quantity,
        )])
        .unwrap()
    }

    #[test]
    fn test_available_subtracts_cart_quantity() {
        assert_eq!(available_to_add(&product("p1", 5), &Cart::new()), 5);
        assert_eq!(available_to_add(&product("p1", 5), &cart_with("p1", 3)), 2);
        assert_eq!(available_to_add(&product("p1", 5), &cart_with("p2", 3)), 5);
    }

    #[test]
    fn test_available_never_negative() {
        assert_eq!(available_to_add(&product("p1", 2), &cart_with("p1", 4)), 0);
        assert_eq!(available_to_add(&product("p1", -3), &Cart::new()), 0);
    }

    #[test]
    fn test_unidentified_product_has_nothing_available() {
        let nameless = CatalogProduct::new(json!({"name": "Ghost", "stock": 9}));
        assert_eq!(available_to_add(&nameless, &Cart::new()), 0);
        assert_eq!(quantity_in_cart(&nameless, &cart_with("p1", 1)), 0);
    }

    #[test]
    fn test_parse_quantity() {
        for (raw, expected) in [
            ("3", 3),
            ("  7 ", 7),
            ("+4", 4),
            ("12abc", 12),
            ("2.9", 2),
            ("abc", 0),
            ("", 0),
            ("-5", 0),
            ("-", 0),
            ("99999999999999", u32::MAX),
        ] {
            assert_eq!(parse_quantity(raw), expected, "input {raw:?}");
        }
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(-1, 5), 0);
        assert_eq!(clamp_quantity(3, 5), 3);
        assert_eq!(clamp_quantity(9, 5), 5);
        assert_eq!(clamp_quantity(i64::MAX, u32::MAX), u32::MAX);
    }
}
