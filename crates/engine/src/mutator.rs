//! Cart mutations.
//!
//! Every committing operation re-reads the store, applies one change and
//! saves, so it always works on the latest cart any tab has written. Staged
//! quantities (what the shopper has dialed in but not added yet) are local to
//! one mutator and never persisted.

use std::collections::HashMap;

use cartwright_core::{Cart, CartLine, DecrementPolicy, ProductId};
use tracing::{debug, info, warn};

use crate::catalog::CatalogProduct;
use crate::error::{CartError, Result, add_breadcrumb};
use crate::reconciler::{available_to_add, clamp_quantity, parse_quantity};
use crate::store::CartStore;

/// Add/adjust/remove operations over a [`CartStore`].
pub struct CartMutator {
    store: CartStore,
    policy: DecrementPolicy,
    staged: HashMap<ProductId, u32>,
}

impl CartMutator {
    /// Create a mutator with no staged quantities.
    #[must_use]
    pub fn new(store: CartStore, policy: DecrementPolicy) -> Self {
        Self {
            store,
            policy,
            staged: HashMap::new(),
        }
    }

    /// Staged quantity for a product, 0 when nothing is staged.
    #[must_use]
    pub fn staged(&self, product_id: &ProductId) -> u32 {
        self.staged.get(product_id).copied().unwrap_or(0)
    }

    /// Stage a quantity from free-form input.
    ///
    /// Non-numeric input reads as 0; the result is clamped to what can still
    /// be added. Returns the staged value.
    pub fn set_desired_quantity(&mut self, product: &CatalogProduct, raw: &str) -> u32 {
        let requested = i64::from(parse_quantity(raw));
        self.stage(product, |_| requested)
    }

    /// Move the staged quantity by `delta`, clamped to what can still be added.
    pub fn step_desired_quantity(&mut self, product: &CatalogProduct, delta: i64) -> u32 {
        self.stage(product, |current| i64::from(current).saturating_add(delta))
    }

    fn stage(&mut self, product: &CatalogProduct, next: impl FnOnce(u32) -> i64) -> u32 {
        let Some(id) = product.id() else {
            return 0;
        };
        let available = available_to_add(product, &self.store.load());
        let quantity = clamp_quantity(next(self.staged(&id)), available);

        if quantity == 0 {
            self.staged.remove(&id);
        } else {
            self.staged.insert(id.clone(), quantity);
        }
        debug!(product_id = %id, quantity, available, "Staged quantity");
        quantity
    }

    /// Commit `desired` units of `product` to the cart.
    ///
    /// An existing line keeps its name and price and grows by `desired`.
    /// On success the staged quantity for the product resets to 0.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `desired` is 0
    /// - `MissingProductId` if the product has no identifier
    /// - `StockExceeded` if the cart would hold more than the catalog stock;
    ///   the cart is left unchanged
    /// - `Storage` if the cart cannot be saved
    pub fn add_to_cart(&mut self, product: &CatalogProduct, desired: u32) -> Result<Cart> {
        if desired == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let id = product.id().ok_or(CartError::MissingProductId)?;

        let mut cart = self.store.load();
        let in_cart = cart.quantity_of(&id);
        let stock = product.stock();
        if u64::from(in_cart) + u64::from(desired) > u64::from(stock) {
            warn!(product_id = %id, in_cart, desired, stock, "Add rejected: stock exceeded");
            return Err(CartError::StockExceeded {
                product_id: id,
                requested: desired,
                in_cart,
                stock,
            });
        }

        let line = match cart.line(&id) {
            Some(existing) => CartLine {
                quantity: in_cart + desired,
                ..existing.clone()
            },
            None => CartLine::new(id.clone(), product.name(), product.unit_price(), desired),
        };
        cart.put_line(line);
        self.store.save(&cart)?;
        self.staged.remove(&id);

        let id_text = id.to_string();
        let quantity_text = desired.to_string();
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", id_text.as_str()), ("quantity", quantity_text.as_str())]),
        );
        info!(product_id = %id, quantity = desired, total = in_cart + desired, "Added to cart");
        Ok(cart)
    }

    /// Commit whatever is staged for `product`.
    ///
    /// # Errors
    ///
    /// As [`Self::add_to_cart`]; nothing staged is `InvalidQuantity`.
    pub fn add_staged(&mut self, product: &CatalogProduct) -> Result<Cart> {
        let desired = product.id().map_or(0, |id| self.staged(&id));
        self.add_to_cart(product, desired)
    }

    /// Adjust a committed line by `delta` under the decrement policy.
    ///
    /// A product with no line is left alone and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn increment_line_quantity(&self, product_id: &ProductId, delta: i64) -> Result<Cart> {
        let mut cart = self.store.load();
        let Some(current) = cart.line(product_id).map(|line| line.quantity) else {
            debug!(%product_id, "No line to adjust");
            return Ok(cart);
        };

        match self.policy.apply(current, delta) {
            Some(quantity) => {
                cart.set_quantity(product_id, quantity);
            }
            None => {
                cart.remove(product_id);
            }
        }
        self.store.save(&cart)?;

        let id_text = product_id.to_string();
        add_breadcrumb("cart", "Adjusted line quantity", Some(&[("product_id", id_text.as_str())]));
        info!(%product_id, from = current, to = cart.quantity_of(product_id), "Adjusted line quantity");
        Ok(cart)
    }

    /// Delete a line. Saves and broadcasts even when the line was absent.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn remove_line(&self, product_id: &ProductId) -> Result<Cart> {
        let mut cart = self.store.load();
        let removed = cart.remove(product_id).is_some();
        self.store.save(&cart)?;

        let id_text = product_id.to_string();
        add_breadcrumb("cart", "Removed line", Some(&[("product_id", id_text.as_str())]));
        info!(%product_id, removed, "Removed cart line");
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn clear(&self) -> Result<()> {
        self.store.save(&Cart::new())?;
        add_breadcrumb("cart", "Cleared cart", None);
        info!("Cleared cart");
        Ok(())
    }

    /// The store this mutator writes to.
    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    /// Decrement policy for committed lines.
    #[must_use]
    pub const fn policy(&self) -> DecrementPolicy {
        self.policy
    }
}
