//! Persisted cart store.
//!
//! The cart slot is the single source of truth for cart contents across page
//! loads and tabs. A second slot mirrors the total item count for consumers
//! outside the engine; the engine itself always counts from the cart.
//!
//! `load` never fails: missing data is an empty cart, and corrupt data is
//! logged and recovered as an empty cart. `save` always ends with a
//! notification, so no write path can change the cart silently.

use cartwright_core::Cart;
use tracing::{debug, warn};

use crate::notifier::{CartSubscription, Notifier};
use crate::storage::{LocalStorage, StorageError};

/// Names of the durable slots the engine owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Serialized cart (JSON array of lines).
    pub cart: String,
    /// Total item count mirror.
    pub item_count: String,
    /// Customer identifier stored at login.
    pub customer_id: String,
    /// Bearer credential stored at login.
    pub token: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            cart: "cart".to_string(),
            item_count: "cartItemsCount".to_string(),
            customer_id: "customerId".to_string(),
            token: "token".to_string(),
        }
    }
}

impl StorageKeys {
    /// Slots whose changes count as cart changes.
    #[must_use]
    pub fn cart_slots(&self) -> Vec<String> {
        vec![self.cart.clone(), self.item_count.clone()]
    }
}

/// Durable cart slot for one tab.
///
/// Cheaply cloneable; clones share the same tab and notifier.
#[derive(Clone)]
pub struct CartStore {
    storage: LocalStorage,
    notifier: Notifier,
    keys: StorageKeys,
}

impl CartStore {
    /// Create a store over a tab's storage.
    #[must_use]
    pub const fn new(storage: LocalStorage, notifier: Notifier, keys: StorageKeys) -> Self {
        Self {
            storage,
            notifier,
            keys,
        }
    }

    /// Read the current cart.
    ///
    /// Missing, unreadable or malformed data yields an empty cart.
    #[must_use]
    pub fn load(&self) -> Cart {
        let raw = match self.storage.get(&self.keys.cart) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::new(),
            Err(e) => {
                warn!(error = %e, "Cart storage unreadable, treating cart as empty");
                return Cart::new();
            }
        };

        match Cart::from_json(&raw) {
            Ok(cart) => {
                debug!(lines = cart.len(), "Loaded cart");
                cart
            }
            Err(e) => {
                warn!(error = %e, "Cart storage corrupt, treating cart as empty");
                Cart::new()
            }
        }
    }

    /// Overwrite the stored cart and broadcast the change.
    ///
    /// The count mirror is written after the cart. If only the mirror write
    /// fails, the change is still broadcast (the cart did change) and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either slot cannot be written.
    pub fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        let encoded = cart.to_json()?;
        self.storage.set(&self.keys.cart, &encoded)?;
        let mirrored = self
            .storage
            .set(&self.keys.item_count, &cart.item_count().to_string());
        self.notifier.notify_cart_changed();
        mirrored
    }

    /// Total item count for badges.
    ///
    /// Derived from the decoded cart so a badge always agrees with the cart
    /// page. A mirror slot that disagrees (left behind by a corrupt cart or by
    /// two tabs interleaving their writes) is rewritten to match.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        let count = self.load().item_count();
        let mirrored = match self.storage.get(&self.keys.item_count) {
            Ok(raw) => raw.map_or(Some(0), |raw| raw.trim().parse::<u64>().ok()),
            Err(e) => {
                warn!(error = %e, "Item count mirror unreadable");
                return count;
            }
        };

        if mirrored != Some(count) {
            warn!(?mirrored, count, "Item count mirror stale, rewriting");
            if let Err(e) = self.storage.set(&self.keys.item_count, &count.to_string()) {
                warn!(error = %e, "Failed to repair item count mirror");
            }
        }
        count
    }

    /// Subscribe to cart changes from this tab and other tabs.
    #[must_use]
    pub fn subscribe(&self) -> CartSubscription {
        self.notifier.subscribe()
    }

    /// The tab's storage handle.
    #[must_use]
    pub const fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Slot names in use.
    #[must_use]
    pub const fn keys(&self) -> &StorageKeys {
        &self.keys
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{CartLine, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::notifier::ChangeSource;
    use crate::storage::Profile;

    fn store_for(profile: &Profile) -> CartStore {
        let storage = profile.open_tab();
        let keys = StorageKeys::default();
        let notifier = Notifier::new(storage.clone(), keys.cart_slots(), 16);
        CartStore::new(storage, notifier, keys)
    }

    fn sample_cart() -> Cart {
        Cart::from_lines(vec![
            CartLine::new(ProductId::from("p1"), "Mate", Decimal::new(1999, 2), 3),
            CartLine::new(ProductId::from(2_i64), "Yerba", Decimal::from(5), 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_cart_loads_empty() {
        let store = store_for(&Profile::in_memory(16));
        assert!(store.load().is_empty());
        assert_eq!(store.item_count(), 0);
    }

    #[test]
    fn test_corrupt_cart_loads_empty() {
        let profile = Profile::in_memory(16);
        let store = store_for(&profile);

        for raw in ["{oops", "42", r#"[{"productId":"p1"}]"#] {
            store.storage().set("cart", raw).unwrap();
            assert!(store.load().is_empty(), "{raw} should load as empty");
        }
    }

    #[test]
    fn test_save_load_is_idempotent() {
        let store = store_for(&Profile::in_memory(16));
        store.save(&sample_cart()).unwrap();

        let first = store.load();
        let raw_first = store.storage().get("cart").unwrap();
        store.save(&first).unwrap();
        let second = store.load();

        assert_eq!(first, sample_cart());
        assert_eq!(second, first);
        assert_eq!(store.storage().get("cart").unwrap(), raw_first);
    }

    #[test]
    fn test_save_writes_count_mirror_and_broadcasts() {
        let store = store_for(&Profile::in_memory(16));
        let mut subscription = store.subscribe();

        store.save(&sample_cart()).unwrap();

        assert_eq!(store.storage().get("cartItemsCount").unwrap().as_deref(), Some("4"));
        assert_eq!(store.item_count(), 4);
        assert_eq!(subscription.try_changed(), Some(ChangeSource::ThisTab));
    }

    #[test]
    fn test_item_count_repairs_unparsable_mirror() {
        let store = store_for(&Profile::in_memory(16));
        store.save(&sample_cart()).unwrap();
        store.storage().set("cartItemsCount", "lots").unwrap();

        assert_eq!(store.item_count(), 4);
        assert_eq!(store.storage().get("cartItemsCount").unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn test_corrupt_cart_counts_as_empty_despite_mirror() {
        let store = store_for(&Profile::in_memory(16));
        store.save(&sample_cart()).unwrap();
        store.storage().set("cart", "not json").unwrap();

        assert_eq!(store.item_count(), 0);
        assert_eq!(store.storage().get("cartItemsCount").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_interleaved_tab_writes_converge_on_cart() {
        let profile = Profile::in_memory(16);
        let tab_a = store_for(&profile);
        let tab_b = store_for(&profile);
        let emptied = Cart::new();

        // Tab A writes its cart, tab B writes both slots, then tab A's mirror
        // write lands last.
        tab_a.storage().set("cart", &sample_cart().to_json().unwrap()).unwrap();
        tab_b.save(&emptied).unwrap();
        tab_a.storage().set("cartItemsCount", "4").unwrap();

        assert!(tab_a.load().is_empty());
        assert_eq!(tab_a.item_count(), 0);
        assert_eq!(tab_b.item_count(), 0);
        assert_eq!(tab_b.storage().get("cartItemsCount").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_fresh_profile_leaves_mirror_unwritten() {
        let store = store_for(&Profile::in_memory(16));
        assert_eq!(store.item_count(), 0);
        assert!(store.storage().get("cartItemsCount").unwrap().is_none());
    }

    #[test]
    fn test_reads_legacy_numeric_layout() {
        let store = store_for(&Profile::in_memory(16));
        store
            .storage()
            .set(
                "cart",
                r#"[{"productId":7,"name":"Termo","unitPrice":12000,"quantity":1}]"#,
            )
            .unwrap();

        let cart = store.load();
        assert_eq!(cart.quantity_of(&ProductId::from(7_i64)), 1);
        assert_eq!(cart.subtotal(), Decimal::from(12000));
    }
}
