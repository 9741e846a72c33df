//! Unified error handling with Sentry integration.
//!
//! [`CartError`] is the engine-level error every cart and checkout operation
//! returns. None of its variants is fatal: each maps to a safe visible state
//! (unchanged cart, retry prompt) and a display message via
//! [`CartError::user_message`].
//!
//! Corrupt durable data never appears here. The store recovers it as an
//! empty cart and only logs it.

use cartwright_core::ProductId;
use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested quantity was zero or not a number.
    #[error("Invalid quantity: must be greater than zero")]
    InvalidQuantity,

    /// Committing would put more units in the cart than the catalog holds.
    #[error(
        "Stock exceeded for product {product_id}: {in_cart} in cart + {requested} requested > {stock} in stock"
    )]
    StockExceeded {
        product_id: ProductId,
        requested: u32,
        in_cart: u32,
        stock: u32,
    },

    /// Catalog record without a usable identifier.
    #[error("Product has no identifier")]
    MissingProductId,

    /// Checkout form is incomplete.
    #[error("Invalid checkout: {0}")]
    InvalidCheckout(&'static str),

    /// The remote order endpoint failed or rejected the order.
    #[error("Order submission failed: {0}")]
    OrderSubmissionFailed(#[source] ApiError),

    /// Durable storage could not be written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Message suitable for showing to the shopper.
    ///
    /// Remote and storage failures are summarized without internal details.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity => "Select a quantity greater than 0".to_string(),
            Self::StockExceeded {
                stock, in_cart, ..
            } => {
                let remaining = stock.saturating_sub(*in_cart);
                if remaining == 0 {
                    "No more stock available for this product".to_string()
                } else {
                    format!("Only {remaining} more can be added")
                }
            }
            Self::MissingProductId => "This product cannot be added".to_string(),
            Self::InvalidCheckout(field) => format!("{field} is required"),
            Self::OrderSubmissionFailed(_) => {
                "Error processing the order. Please try again.".to_string()
            }
            Self::Storage(_) => "Your cart could not be saved".to_string(),
        }
    }

    /// Whether repeating the same action may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OrderSubmissionFailed(_) | Self::Storage(_))
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Set the Sentry user context from the stored customer identifier.
///
/// Call this after login so checkout failures are associated with the
/// customer.
pub fn set_sentry_user(customer_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes leading up to a failed checkout.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::StockExceeded {
            product_id: ProductId::from("p1"),
            requested: 3,
            in_cart: 3,
            stock: 5,
        };
        assert_eq!(
            err.to_string(),
            "Stock exceeded for product p1: 3 in cart + 3 requested > 5 in stock"
        );
        assert_eq!(
            CartError::InvalidCheckout("Shipping address").to_string(),
            "Invalid checkout: Shipping address"
        );
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = CartError::OrderSubmissionFailed(ApiError::Status {
            status: 500,
            message: "NullReferenceException at OrderService".to_string(),
        });
        assert!(!err.user_message().contains("NullReference"));
        assert!(err.is_retryable());

        let err = CartError::StockExceeded {
            product_id: ProductId::from("p1"),
            requested: 3,
            in_cart: 3,
            stock: 5,
        };
        assert_eq!(err.user_message(), "Only 2 more can be added");
        assert!(!err.is_retryable());

        let err = CartError::StockExceeded {
            product_id: ProductId::from("p1"),
            requested: 1,
            in_cart: 5,
            stock: 5,
        };
        assert_eq!(err.user_message(), "No more stock available for this product");
    }
}
