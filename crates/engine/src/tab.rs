//! One open tab of a storage profile.
//!
//! Wires a tab's storage handle, notifier and store together, and hands out
//! the components that work on them. Everything a tab creates shares one
//! "cart changed" topic.

use cartwright_core::{DecrementPolicy, TabId};

use crate::api::{LoginApi, OrderApi};
use crate::auth::{AuthError, AuthState, SessionAuth, clear_session};
use crate::catalog::CatalogProduct;
use crate::checkout::CheckoutCoordinator;
use crate::config::EngineConfig;
use crate::mutator::CartMutator;
use crate::notifier::Notifier;
use crate::storage::{LocalStorage, Profile};
use crate::store::CartStore;
use crate::views::{CartBadge, CartPage, ProductGrid};

/// A tab's engine components.
#[derive(Clone)]
pub struct Tab {
    store: CartStore,
    policy: DecrementPolicy,
    event_capacity: usize,
}

impl Tab {
    /// Open a new tab onto `profile`.
    #[must_use]
    pub fn open(profile: &Profile, config: &EngineConfig) -> Self {
        let storage = profile.open_tab();
        let notifier = Notifier::new(
            storage.clone(),
            config.keys.cart_slots(),
            config.event_capacity,
        );
        Self {
            store: CartStore::new(storage, notifier, config.keys.clone()),
            policy: config.decrement_policy,
            event_capacity: config.event_capacity,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TabId {
        self.store.storage().tab()
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    #[must_use]
    pub const fn storage(&self) -> &LocalStorage {
        self.store.storage()
    }

    #[must_use]
    pub fn mutator(&self) -> CartMutator {
        CartMutator::new(self.store.clone(), self.policy)
    }

    #[must_use]
    pub fn badge(&self) -> CartBadge {
        CartBadge::new(self.store.clone())
    }

    #[must_use]
    pub fn product_grid(&self, products: Vec<CatalogProduct>) -> ProductGrid {
        ProductGrid::new(self.store.clone(), self.policy, products)
    }

    #[must_use]
    pub fn cart_page(&self) -> CartPage {
        CartPage::new(self.store.clone(), self.policy)
    }

    /// Session bound to this tab's storage.
    #[must_use]
    pub fn session<L: LoginApi>(&self, api: L) -> SessionAuth<L> {
        SessionAuth::new(
            self.store.storage().clone(),
            self.store.keys().clone(),
            api,
        )
    }

    /// Drop the stored session without a login endpoint. The cart is kept.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the session slots cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        clear_session(self.store.storage(), self.store.keys())
    }

    #[must_use]
    pub fn checkout<O: OrderApi, A: AuthState>(&self, orders: O, auth: A) -> CheckoutCoordinator<O, A> {
        CheckoutCoordinator::new(self.store.clone(), orders, auth, self.event_capacity)
    }
}
