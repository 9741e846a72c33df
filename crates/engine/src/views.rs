//! View state for the cart surfaces.
//!
//! Each view subscribes to the "cart changed" topic when created and drops
//! the subscription with itself. On every wake-up it re-reads the store;
//! nothing it renders comes from an event payload.

use std::future::Future;

use cartwright_core::{Cart, CartLine, DecrementPolicy, ProductId};
use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{CatalogProduct, filter_by_name};
use crate::error::Result;
use crate::mutator::CartMutator;
use crate::notifier::{CartSubscription, ChangeSource};
use crate::reconciler::available_to_add;
use crate::store::CartStore;

/// Label shown instead of the add controls when nothing can be added.
pub const OUT_OF_STOCK_LABEL: &str = "out of stock";

/// A view that re-derives its state from the store on every cart change.
pub trait CartView {
    /// Re-read the store.
    fn refresh(&mut self);

    /// The view's live subscription.
    fn subscription(&mut self) -> &mut CartSubscription;

    /// Wait for the next cart change and refresh.
    ///
    /// Wake-ups that piled up meanwhile are folded into the same refresh.
    /// Returns `None` once the tab is gone.
    fn next_change(&mut self) -> impl Future<Output = Option<ChangeSource>> + Send
    where
        Self: Send,
    {
        async move {
            let source = self.subscription().changed().await?;
            self.subscription().drain();
            self.refresh();
            Some(source)
        }
    }

    /// Refresh if any change arrived since the last refresh.
    fn sync(&mut self) -> bool {
        let pending = self.subscription().drain() > 0;
        if pending {
            self.refresh();
        }
        pending
    }
}

// =============================================================================
// CartBadge
// =============================================================================

/// Header badge showing the total number of items.
pub struct CartBadge {
    store: CartStore,
    subscription: CartSubscription,
    count: u64,
}

impl CartBadge {
    #[must_use]
    pub fn new(store: CartStore) -> Self {
        let subscription = store.subscribe();
        let count = store.item_count();
        Self {
            store,
            subscription,
            count,
        }
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }
}

impl CartView for CartBadge {
    fn refresh(&mut self) {
        self.count = self.store.item_count();
        debug!(count = self.count, "Badge refreshed");
    }

    fn subscription(&mut self) -> &mut CartSubscription {
        &mut self.subscription
    }
}

// =============================================================================
// ProductGrid
// =============================================================================

/// State of the quantity selector and add button for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddControls {
    pub staged: u32,
    pub available: u32,
    pub can_decrement: bool,
    pub can_increment: bool,
    pub can_add: bool,
    /// `Some` when nothing more can be added.
    pub stock_label: Option<&'static str>,
}

/// Catalog listing with per-product quantity selectors.
pub struct ProductGrid {
    products: Vec<CatalogProduct>,
    cart: Cart,
    mutator: CartMutator,
    subscription: CartSubscription,
}

impl ProductGrid {
    #[must_use]
    pub fn new(store: CartStore, policy: DecrementPolicy, products: Vec<CatalogProduct>) -> Self {
        let subscription = store.subscribe();
        let cart = store.load();
        Self {
            products,
            cart,
            mutator: CartMutator::new(store, policy),
            subscription,
        }
    }

    /// Replace the listed products, e.g. after loading another page.
    pub fn set_products(&mut self, products: Vec<CatalogProduct>) {
        self.products = products;
    }

    #[must_use]
    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    /// Listed products whose names contain `term`, ignoring case.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&CatalogProduct> {
        filter_by_name(&self.products, term)
    }

    /// Units of `product` that can still be added, against the last cart read.
    #[must_use]
    pub fn available(&self, product: &CatalogProduct) -> u32 {
        available_to_add(product, &self.cart)
    }

    #[must_use]
    pub fn controls(&self, product: &CatalogProduct) -> AddControls {
        let available = self.available(product);
        let staged = product.id().map_or(0, |id| self.mutator.staged(&id));
        AddControls {
            staged,
            available,
            can_decrement: staged > 0,
            can_increment: staged < available,
            can_add: staged > 0 && available > 0,
            stock_label: (available == 0).then_some(OUT_OF_STOCK_LABEL),
        }
    }

    /// Type a quantity into the selector.
    pub fn set_desired_quantity(&mut self, product: &CatalogProduct, raw: &str) -> u32 {
        self.mutator.set_desired_quantity(product, raw)
    }

    /// Press the selector's `+` (positive) or `-` (negative) button.
    pub fn step_desired_quantity(&mut self, product: &CatalogProduct, delta: i64) -> u32 {
        self.mutator.step_desired_quantity(product, delta)
    }

    /// Press the add button.
    ///
    /// # Errors
    ///
    /// As [`CartMutator::add_staged`]; the grid keeps its last cart read.
    pub fn add(&mut self, product: &CatalogProduct) -> Result<()> {
        self.cart = self.mutator.add_staged(product)?;
        Ok(())
    }

    /// Cart as last read.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }
}

impl CartView for ProductGrid {
    fn refresh(&mut self) {
        self.cart = self.mutator.store().load();
        debug!(lines = self.cart.len(), "Product grid refreshed");
    }

    fn subscription(&mut self) -> &mut CartSubscription {
        &mut self.subscription
    }
}

// =============================================================================
// CartPage
// =============================================================================

/// The cart screen: committed lines with quantity steppers and removal.
pub struct CartPage {
    cart: Cart,
    mutator: CartMutator,
    subscription: CartSubscription,
}

impl CartPage {
    #[must_use]
    pub fn new(store: CartStore, policy: DecrementPolicy) -> Self {
        let subscription = store.subscribe();
        let cart = store.load();
        Self {
            cart,
            mutator: CartMutator::new(store, policy),
            subscription,
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        self.cart.lines()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.cart.subtotal()
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn increment(&mut self, product_id: &ProductId) -> Result<()> {
        self.cart = self.mutator.increment_line_quantity(product_id, 1)?;
        Ok(())
    }

    /// Under the default policy the quantity stops at one.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn decrement(&mut self, product_id: &ProductId) -> Result<()> {
        self.cart = self.mutator.increment_line_quantity(product_id, -1)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Storage` if the cart cannot be saved.
    pub fn remove(&mut self, product_id: &ProductId) -> Result<()> {
        self.cart = self.mutator.remove_line(product_id)?;
        Ok(())
    }
}

impl CartView for CartPage {
    fn refresh(&mut self) {
        self.cart = self.mutator.store().load();
        debug!(lines = self.cart.len(), "Cart page refreshed");
    }

    fn subscription(&mut self) -> &mut CartSubscription {
        &mut self.subscription
    }
}
