//! Core types for Cartwright.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod order;
pub mod policy;

pub use cart::{Cart, CartDecodeError, CartInvariantError, CartLine};
pub use id::{CustomerId, ProductId, TabId};
pub use order::{OrderItem, OrderPayload};
pub use policy::DecrementPolicy;
