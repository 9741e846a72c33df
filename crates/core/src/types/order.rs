//! Order-creation payload sent to the remote orders endpoint.
//!
//! Field names are `PascalCase` because the orders API binds them directly to
//! its request model. Prices are deliberately absent: the server recomputes
//! them from its own catalog.

use serde::{Deserialize, Serialize};

use super::cart::Cart;
use super::id::{CustomerId, ProductId};

/// One ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderPayload {
    pub shipping_address: String,
    pub billing_address: String,
    /// Serialized as `null` when no customer identity is stored.
    pub customer_id: Option<CustomerId>,
    pub order_items: Vec<OrderItem>,
}

impl OrderPayload {
    /// Build a payload from the current cart contents.
    #[must_use]
    pub fn from_cart(
        cart: &Cart,
        customer_id: Option<CustomerId>,
        shipping_address: impl Into<String>,
        billing_address: impl Into<String>,
    ) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            billing_address: billing_address.into(),
            customer_id,
            order_items: cart
                .lines()
                .iter()
                .map(|line| OrderItem {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::CartLine;

    #[test]
    fn test_payload_wire_shape_omits_prices() {
        let cart = Cart::from_lines(vec![
            CartLine::new(ProductId::from(4_i64), "Yerba", Decimal::from(900), 2),
            CartLine::new(ProductId::from("p9"), "Bombilla", Decimal::from(300), 1),
        ])
        .unwrap();

        let payload = OrderPayload::from_cart(
            &cart,
            Some(CustomerId::new("c-17")),
            "Calle 123",
            "Calle 456",
        );
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "ShippingAddress": "Calle 123",
                "BillingAddress": "Calle 456",
                "CustomerId": "c-17",
                "OrderItems": [
                    {"ProductId": 4, "Quantity": 2},
                    {"ProductId": "p9", "Quantity": 1}
                ]
            })
        );
    }

    #[test]
    fn test_missing_customer_serializes_as_null() {
        let payload = OrderPayload::from_cart(&Cart::new(), None, "a", "b");
        let json = serde_json::to_value(&payload).unwrap();

        assert!(json["CustomerId"].is_null());
        assert_eq!(json["OrderItems"], serde_json::json!([]));
    }
}
