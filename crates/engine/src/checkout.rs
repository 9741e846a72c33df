//! Checkout coordination across an interleaved login.
//!
//! ```text
//! Idle ──request (signed in)──▶ Submitting ──▶ Succeeded ──▶ Idle
//!   │                               ▲      └──▶ Failed ────▶ Idle
//!   └──request (signed out)──▶ AwaitingAuth
//!                                   │  auth flips to true: resume
//!                                   └──dismiss──▶ Idle
//! ```
//!
//! The suspended request is an explicit [`PendingCheckoutIntent`] holding the
//! submitted form. It is resumed from the auth subscription: either by
//! feeding [`CheckoutCoordinator::on_auth_changed`] from an event loop, or by
//! awaiting [`CheckoutCoordinator::await_authentication`].
//!
//! The cart is re-read at submission time, so edits made while the login
//! prompt was open are what gets ordered. Only a placed order clears it.

use cartwright_core::{DecrementPolicy, OrderPayload};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::api::{OrderApi, OrderReceipt};
use crate::auth::AuthState;
use crate::error::{CartError, Result, add_breadcrumb};
use crate::mutator::CartMutator;
use crate::store::CartStore;

/// Where the coordinator is in the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    /// Waiting for the shopper to log in.
    AwaitingAuth,
    /// Order request in flight.
    Submitting,
    /// Order placed; the cart has been cleared.
    Succeeded,
    /// Order not placed; carries the message for the shopper.
    Failed(String),
}

/// Shipping and billing details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutForm {
    pub shipping_address: String,
    pub billing_address: String,
}

impl CheckoutForm {
    #[must_use]
    pub fn new(shipping_address: impl Into<String>, billing_address: impl Into<String>) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            billing_address: billing_address.into(),
        }
    }

    /// Check that both addresses are filled in.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckout` naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        if self.shipping_address.trim().is_empty() {
            return Err(CartError::InvalidCheckout("Shipping address"));
        }
        if self.billing_address.trim().is_empty() {
            return Err(CartError::InvalidCheckout("Billing address"));
        }
        Ok(())
    }
}

/// A checkout suspended on login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingCheckoutIntent {
    #[default]
    None,
    AwaitingAuthentication(CheckoutForm),
}

impl PendingCheckoutIntent {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingAuthentication(_))
    }
}

/// Result of a checkout step that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Nothing to do: the cart was empty or no checkout was pending.
    Ignored,
    /// The shopper must log in; the request is held until they do.
    LoginRequired,
    /// The order was placed and the cart cleared.
    Placed(OrderReceipt),
}

/// Drives one tab's checkout.
pub struct CheckoutCoordinator<O, A> {
    mutator: CartMutator,
    orders: O,
    auth: A,
    auth_rx: watch::Receiver<bool>,
    state: CheckoutState,
    intent: PendingCheckoutIntent,
    events: broadcast::Sender<CheckoutState>,
}

impl<O: OrderApi, A: AuthState> CheckoutCoordinator<O, A> {
    /// Create an idle coordinator.
    ///
    /// `capacity` bounds the buffered state events per subscriber.
    #[must_use]
    pub fn new(store: CartStore, orders: O, auth: A, capacity: usize) -> Self {
        let auth_rx = auth.subscribe();
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            mutator: CartMutator::new(store, DecrementPolicy::default()),
            orders,
            auth,
            auth_rx,
            state: CheckoutState::Idle,
            intent: PendingCheckoutIntent::None,
            events,
        }
    }

    /// Ask to place an order for the current cart.
    ///
    /// An empty cart is a no-op. Signed out, the form is held and the
    /// coordinator waits for login; a request made while already waiting
    /// replaces the held form.
    ///
    /// # Errors
    ///
    /// - `InvalidCheckout` if an address is blank
    /// - `OrderSubmissionFailed` if the order endpoint fails; the cart is kept
    #[instrument(skip(self, form))]
    pub async fn request_checkout(&mut self, form: CheckoutForm) -> Result<CheckoutOutcome> {
        if matches!(self.state, CheckoutState::Submitting) {
            debug!("Checkout already in flight");
            return Ok(CheckoutOutcome::Ignored);
        }
        if self.mutator.store().load().is_empty() {
            debug!("Checkout requested with empty cart");
            return Ok(CheckoutOutcome::Ignored);
        }
        form.validate()?;

        if self.auth.is_authenticated() {
            self.intent = PendingCheckoutIntent::None;
            return self.submit(&form).await;
        }

        // Only flips after this point may resume the held request.
        self.auth_rx.borrow_and_update();
        self.intent = PendingCheckoutIntent::AwaitingAuthentication(form);
        self.transition(CheckoutState::AwaitingAuth);
        add_breadcrumb("checkout", "Login required", None);
        info!("Checkout waiting for login");
        Ok(CheckoutOutcome::LoginRequired)
    }

    /// React to an authentication change.
    ///
    /// Signing in while a request is held submits it. Anything else is
    /// `Ignored`.
    ///
    /// # Errors
    ///
    /// As [`Self::request_checkout`].
    pub async fn on_auth_changed(&mut self, authenticated: bool) -> Result<CheckoutOutcome> {
        if !authenticated {
            return Ok(CheckoutOutcome::Ignored);
        }
        match std::mem::take(&mut self.intent) {
            PendingCheckoutIntent::AwaitingAuthentication(form) => {
                info!("Login completed, resuming checkout");
                self.submit(&form).await
            }
            PendingCheckoutIntent::None => Ok(CheckoutOutcome::Ignored),
        }
    }

    /// Wait on the auth subscription until a held request can resume, then
    /// submit it.
    ///
    /// Returns `Ignored` at once when nothing is held, and when the auth
    /// source goes away or the prompt is dismissed before login.
    ///
    /// # Errors
    ///
    /// As [`Self::request_checkout`].
    pub async fn await_authentication(&mut self) -> Result<CheckoutOutcome> {
        loop {
            if !self.intent.is_pending() {
                return Ok(CheckoutOutcome::Ignored);
            }
            let authenticated = *self.auth_rx.borrow_and_update();
            if authenticated {
                return self.on_auth_changed(true).await;
            }
            if self.auth_rx.changed().await.is_err() {
                warn!("Auth source closed while checkout was waiting");
                return Ok(CheckoutOutcome::Ignored);
            }
        }
    }

    /// The shopper closed the login prompt: drop the held request.
    pub fn dismiss_login(&mut self) {
        if self.intent.is_pending() {
            self.intent = PendingCheckoutIntent::None;
            self.transition(CheckoutState::Idle);
            info!("Login dismissed, checkout cancelled");
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Held request, if any.
    #[must_use]
    pub const fn intent(&self) -> &PendingCheckoutIntent {
        &self.intent
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutState> {
        self.events.subscribe()
    }

    async fn submit(&mut self, form: &CheckoutForm) -> Result<CheckoutOutcome> {
        let cart = self.mutator.store().load();
        if cart.is_empty() {
            debug!("Cart emptied before submission");
            self.transition(CheckoutState::Idle);
            return Ok(CheckoutOutcome::Ignored);
        }

        self.transition(CheckoutState::Submitting);
        let payload = OrderPayload::from_cart(
            &cart,
            self.auth.customer_id(),
            form.shipping_address.clone(),
            form.billing_address.clone(),
        );
        let items = payload.order_items.len().to_string();
        add_breadcrumb("checkout", "Submitting order", Some(&[("items", items.as_str())]));

        match self.orders.create_order(&payload).await {
            Ok(receipt) => {
                // The order exists; a failed clear must not report it as lost.
                if let Err(e) = self.mutator.clear() {
                    error!(error = %e, "Order placed but cart could not be cleared");
                }
                info!(items = payload.order_items.len(), "Order placed");
                self.transition(CheckoutState::Succeeded);
                self.transition(CheckoutState::Idle);
                Ok(CheckoutOutcome::Placed(receipt))
            }
            Err(e) => {
                let err = CartError::OrderSubmissionFailed(e);
                let event_id = sentry::capture_error(&err);
                error!(error = %err, sentry_event_id = %event_id, "Order submission failed");
                self.transition(CheckoutState::Failed(err.user_message()));
                self.transition(CheckoutState::Idle);
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: CheckoutState) {
        debug!(from = ?self.state, to = ?next, "Checkout transition");
        self.state = next.clone();
        // No subscribers is fine.
        let _ = self.events.send(next);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;

    use cartwright_core::{Cart, CartLine, CustomerId, ProductId};
    use rust_decimal::Decimal;
    use serde_json::Value;

    use super::*;
    use crate::api::ApiError;
    use crate::notifier::Notifier;
    use crate::storage::Profile;
    use crate::store::StorageKeys;

    #[derive(Default)]
    struct FakeOrders {
        fail: bool,
        received: Mutex<Vec<OrderPayload>>,
    }

    impl OrderApi for FakeOrders {
        fn create_order(
            &self,
            payload: &OrderPayload,
        ) -> impl Future<Output = std::result::Result<OrderReceipt, ApiError>> + Send {
            self.received.lock().unwrap().push(payload.clone());
            let result = if self.fail {
                Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(OrderReceipt::new(Value::Null))
            };
            async move { result }
        }
    }

    struct FakeAuth {
        state: watch::Sender<bool>,
    }

    impl FakeAuth {
        fn new(authenticated: bool) -> Self {
            Self {
                state: watch::channel(authenticated).0,
            }
        }
    }

    impl AuthState for FakeAuth {
        fn is_authenticated(&self) -> bool {
            *self.state.borrow()
        }

        fn subscribe(&self) -> watch::Receiver<bool> {
            self.state.subscribe()
        }

        fn customer_id(&self) -> Option<CustomerId> {
            self.is_authenticated().then(|| CustomerId::new("c-1"))
        }
    }

    fn store_with_p1() -> CartStore {
        let storage = Profile::in_memory(16).open_tab();
        let keys = StorageKeys::default();
        let notifier = Notifier::new(storage.clone(), keys.cart_slots(), 16);
        let store = CartStore::new(storage, notifier, keys);
        let cart = Cart::from_lines(vec![CartLine::new(
            ProductId::from("p1"),
            "Mate",
            Decimal::TEN,
            2,
        )])
        .unwrap();
        store.save(&cart).unwrap();
        store
    }

    fn form() -> CheckoutForm {
        CheckoutForm::new("Calle 1", "Calle 2")
    }

    #[tokio::test]
    async fn test_signed_in_checkout_places_order_and_clears_cart() {
        let store = store_with_p1();
        let orders = std::sync::Arc::new(FakeOrders::default());
        let mut checkout =
            CheckoutCoordinator::new(store.clone(), orders.clone(), FakeAuth::new(true), 16);
        let mut events = checkout.subscribe();

        let outcome = checkout.request_checkout(form()).await.unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert!(store.load().is_empty());
        assert_eq!(store.item_count(), 0);
        assert_eq!(events.recv().await.unwrap(), CheckoutState::Submitting);
        assert_eq!(events.recv().await.unwrap(), CheckoutState::Succeeded);
        assert_eq!(events.recv().await.unwrap(), CheckoutState::Idle);

        let sent = orders.received.lock().unwrap();
        assert_eq!(sent[0].customer_id, Some(CustomerId::new("c-1")));
        assert_eq!(sent[0].order_items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_signed_out_checkout_resumes_on_login() {
        let store = store_with_p1();
        let auth = std::sync::Arc::new(FakeAuth::new(false));
        let mut checkout =
            CheckoutCoordinator::new(store.clone(), FakeOrders::default(), auth.clone(), 16);

        let outcome = checkout.request_checkout(form()).await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::LoginRequired);
        assert_eq!(checkout.state(), &CheckoutState::AwaitingAuth);
        assert!(checkout.intent().is_pending());

        auth.state.send_replace(true);
        let outcome = checkout.await_authentication().await.unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert_eq!(checkout.state(), &CheckoutState::Idle);
        assert!(!checkout.intent().is_pending());
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart() {
        let store = store_with_p1();
        let orders = FakeOrders {
            fail: true,
            ..FakeOrders::default()
        };
        let mut checkout = CheckoutCoordinator::new(store.clone(), orders, FakeAuth::new(true), 16);
        let mut events = checkout.subscribe();

        let err = checkout.request_checkout(form()).await.unwrap_err();

        assert!(matches!(err, CartError::OrderSubmissionFailed(_)));
        assert_eq!(store.load().quantity_of(&ProductId::from("p1")), 2);
        assert_eq!(events.recv().await.unwrap(), CheckoutState::Submitting);
        assert_eq!(
            events.recv().await.unwrap(),
            CheckoutState::Failed("Error processing the order. Please try again.".to_string())
        );
        assert_eq!(checkout.state(), &CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_dismissed_login_submits_nothing() {
        let store = store_with_p1();
        let orders = std::sync::Arc::new(FakeOrders::default());
        let auth = std::sync::Arc::new(FakeAuth::new(false));
        let mut checkout =
            CheckoutCoordinator::new(store.clone(), orders.clone(), auth.clone(), 16);

        checkout.request_checkout(form()).await.unwrap();
        checkout.dismiss_login();
        auth.state.send_replace(true);

        assert_eq!(checkout.state(), &CheckoutState::Idle);
        assert_eq!(checkout.await_authentication().await.unwrap(), CheckoutOutcome::Ignored);
        assert!(orders.received.lock().unwrap().is_empty());
        assert!(!store.load().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_and_blank_form() {
        let store = store_with_p1();
        let mut checkout =
            CheckoutCoordinator::new(store.clone(), FakeOrders::default(), FakeAuth::new(true), 16);

        let err = checkout
            .request_checkout(CheckoutForm::new("Calle 1", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidCheckout("Billing address")));

        store.save(&Cart::new()).unwrap();
        let outcome = checkout.request_checkout(form()).await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::Ignored);
        assert_eq!(checkout.state(), &CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_logout_does_not_resume() {
        let store = store_with_p1();
        let mut checkout =
            CheckoutCoordinator::new(store, FakeOrders::default(), FakeAuth::new(false), 16);

        checkout.request_checkout(form()).await.unwrap();
        let outcome = checkout.on_auth_changed(false).await.unwrap();

        assert_eq!(outcome, CheckoutOutcome::Ignored);
        assert!(checkout.intent().is_pending());
    }
}
