//! Session authentication and the "auth changed" topic.
//!
//! The session is the bearer credential in durable storage: a stored token
//! means authenticated. Login stores the token (and the customer identifier
//! when the server sends one); logout removes both and leaves the cart alone.
//!
//! State changes are published on a `tokio::sync::watch` channel, separate
//! from the cart topic. Subscribers see the latest value, never a backlog.

use std::sync::Arc;

use cartwright_core::CustomerId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, Credentials, LoginApi};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::{LocalStorage, StorageError, StorageEvent};
use crate::store::StorageKeys;

/// Errors that can occur while logging in or out.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login endpoint failed or refused the credentials.
    #[error("Login failed: {0}")]
    Api(#[from] ApiError),

    /// The login response carried no token.
    #[error("Login response contained no credential")]
    MissingCredential,

    /// The session could not be stored or removed.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Read side of authentication, as the checkout coordinator sees it.
pub trait AuthState: Send + Sync {
    /// Whether a session credential is present.
    fn is_authenticated(&self) -> bool;

    /// Subscribe to authentication changes.
    fn subscribe(&self) -> watch::Receiver<bool>;

    /// Customer identifier stored at login, if any.
    fn customer_id(&self) -> Option<CustomerId>;
}

impl<T: AuthState> AuthState for Arc<T> {
    fn is_authenticated(&self) -> bool {
        (**self).is_authenticated()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        (**self).subscribe()
    }

    fn customer_id(&self) -> Option<CustomerId> {
        (**self).customer_id()
    }
}

/// Storage-backed session for one tab.
pub struct SessionAuth<L> {
    storage: LocalStorage,
    keys: StorageKeys,
    api: L,
    state: watch::Sender<bool>,
}

impl<L: LoginApi> SessionAuth<L> {
    /// Create the session, authenticated if a token is already stored.
    #[must_use]
    pub fn new(storage: LocalStorage, keys: StorageKeys, api: L) -> Self {
        let initial = stored_token(&storage, &keys).is_some();
        let (state, _) = watch::channel(initial);
        debug!(authenticated = initial, "Session restored");
        Self {
            storage,
            keys,
            api,
            state,
        }
    }

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// - `Api` if the login endpoint fails or refuses the credentials
    /// - `MissingCredential` if the response has no token; nothing is stored
    /// - `Storage` if the session cannot be stored
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let response = self.api.login(credentials).await?;
        let Some(token) = response.token else {
            warn!("Login response had no token");
            return Err(AuthError::MissingCredential);
        };

        self.storage.set(&self.keys.token, token.expose_secret())?;
        if let Err(e) = self.store_customer_id(response.customer_id.as_ref()) {
            warn!(error = %e, "Customer id not stored, discarding token");
            if let Err(remove_err) = self.storage.remove(&self.keys.token) {
                warn!(error = %remove_err, "Failed to discard token");
            }
            return Err(e.into());
        }

        self.publish(true);
        if let Some(customer_id) = &response.customer_id {
            set_sentry_user(customer_id);
        }
        add_breadcrumb("auth", "Logged in", None);
        info!(has_customer_id = response.customer_id.is_some(), "Logged in");
        Ok(())
    }

    /// A login without a customer id clears the one left by a prior session.
    fn store_customer_id(&self, customer_id: Option<&CustomerId>) -> Result<(), StorageError> {
        match customer_id {
            Some(id) => self.storage.set(&self.keys.customer_id, id.as_str()),
            None => self.storage.remove(&self.keys.customer_id),
        }
    }

    /// End the session. The cart is kept.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the session slots cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        clear_session(&self.storage, &self.keys)?;
        self.publish(false);
        Ok(())
    }

    /// The stored credential, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        stored_token(&self.storage, &self.keys).map(SecretString::from)
    }

    /// Re-derive the state from storage, returning the current value.
    ///
    /// Needed when another tab logged in or out.
    pub fn refresh(&self) -> bool {
        let authenticated = stored_token(&self.storage, &self.keys).is_some();
        self.publish(authenticated);
        authenticated
    }

    /// Follow logins and logouts made in other tabs.
    ///
    /// Runs until the returned future is dropped.
    pub async fn follow_other_tabs(&self) {
        let mut changes = self.storage.foreign_changes();
        while let Some(event) = changes.recv().await {
            let relevant = match &event {
                StorageEvent::Changed(change) => change.key == self.keys.token,
                StorageEvent::Missed(_) => true,
            };
            if relevant {
                self.refresh();
            }
        }
    }

    fn publish(&self, authenticated: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == authenticated {
                false
            } else {
                *current = authenticated;
                true
            }
        });
        if changed {
            debug!(authenticated, "Auth state changed");
        }
    }
}

impl<L: LoginApi> AuthState for SessionAuth<L> {
    fn is_authenticated(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    fn customer_id(&self) -> Option<CustomerId> {
        match self.storage.get(&self.keys.customer_id) {
            Ok(Some(id)) if !id.is_empty() => Some(CustomerId::new(id)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Customer id unreadable");
                None
            }
        }
    }
}

/// Remove the session slots without a login endpoint at hand.
///
/// Sessions open in other tabs pick the logout up through
/// [`SessionAuth::follow_other_tabs`]. The cart is kept.
///
/// # Errors
///
/// Returns `Storage` if the session slots cannot be removed.
pub fn clear_session(storage: &LocalStorage, keys: &StorageKeys) -> Result<(), AuthError> {
    storage.remove(&keys.token)?;
    storage.remove(&keys.customer_id)?;
    clear_sentry_user();
    add_breadcrumb("auth", "Logged out", None);
    info!("Logged out");
    Ok(())
}

fn stored_token(storage: &LocalStorage, keys: &StorageKeys) -> Option<String> {
    match storage.get(&keys.token) {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            warn!(error = %e, "Session token unreadable");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::future::Future;

    use serde_json::json;

    use super::*;
    use crate::api::LoginResponse;
    use crate::storage::{MemoryBackend, Profile, StorageBackend};

    struct FakeLogin(serde_json::Value);

    impl LoginApi for FakeLogin {
        fn login(
            &self,
            credentials: &Credentials,
        ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send {
            let result = if credentials.password.expose_secret() == "wrong" {
                Err(ApiError::Unauthorized)
            } else {
                Ok(LoginResponse::from_json(&self.0))
            };
            async move { result }
        }
    }

    /// Memory backend that refuses writes to one slot.
    struct RefusingBackend {
        inner: MemoryBackend,
        refused: &'static str,
    }

    impl StorageBackend for RefusingBackend {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.refused {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn refusing_profile(refused: &'static str) -> Profile {
        Profile::new(
            RefusingBackend {
                inner: MemoryBackend::new(),
                refused,
            },
            8,
        )
    }

    fn session(profile: &Profile, body: serde_json::Value) -> SessionAuth<FakeLogin> {
        SessionAuth::new(profile.open_tab(), StorageKeys::default(), FakeLogin(body))
    }

    #[tokio::test]
    async fn test_login_stores_session_and_notifies() {
        let profile = Profile::in_memory(8);
        let auth = session(&profile, json!({"token": "t-1", "customerId": "c-7"}));
        let mut rx = auth.subscribe();
        assert!(!auth.is_authenticated());

        auth.login(&Credentials::new("ana", "secret")).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert_eq!(auth.token().unwrap().expose_secret(), "t-1");
        assert_eq!(auth.customer_id(), Some(CustomerId::new("c-7")));
    }

    #[tokio::test]
    async fn test_failed_login_changes_nothing() {
        let profile = Profile::in_memory(8);
        let auth = session(&profile, json!({"token": "t-1"}));
        let rx = auth.subscribe();

        let err = auth.login(&Credentials::new("ana", "wrong")).await.unwrap_err();
        assert!(matches!(err, AuthError::Api(ApiError::Unauthorized)));

        let tokenless = session(&profile, json!({"customerId": "c-7"}));
        let err = tokenless.login(&Credentials::new("ana", "ok")).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));

        assert!(!rx.has_changed().unwrap());
        assert!(auth.token().is_none());
        assert!(auth.customer_id().is_none());
    }

    #[tokio::test]
    async fn test_logout_keeps_cart() {
        let profile = Profile::in_memory(8);
        let auth = session(&profile, json!("bare-token"));
        auth.login(&Credentials::new("ana", "secret")).await.unwrap();
        profile.open_tab().set("cart", "[]").unwrap();
        profile.open_tab().set("customerId", "c-1").unwrap();

        auth.logout().unwrap();

        assert!(!auth.is_authenticated());
        assert!(auth.customer_id().is_none());
        assert!(auth.token().is_none());
        assert_eq!(profile.open_tab().get("cart").unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_token_write_failure_leaves_no_customer_id() {
        let profile = refusing_profile("token");
        let auth = session(&profile, json!({"token": "t-1", "customerId": "c-7"}));

        let err = auth.login(&Credentials::new("ana", "secret")).await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!auth.is_authenticated());
        assert!(auth.token().is_none());
        assert!(auth.customer_id().is_none());
    }

    #[tokio::test]
    async fn test_customer_id_write_failure_discards_token() {
        let profile = refusing_profile("customerId");
        let auth = session(&profile, json!({"token": "t-1", "customerId": "c-7"}));

        let err = auth.login(&Credentials::new("ana", "secret")).await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert!(!auth.is_authenticated());
        assert!(auth.token().is_none());
    }

    #[tokio::test]
    async fn test_login_without_customer_id_clears_previous_one() {
        let profile = Profile::in_memory(8);
        profile.open_tab().set("customerId", "c-old").unwrap();
        let auth = session(&profile, json!("bare-token"));

        auth.login(&Credentials::new("ana", "secret")).await.unwrap();

        assert!(auth.is_authenticated());
        assert!(auth.customer_id().is_none());
    }

    #[tokio::test]
    async fn test_clear_session_needs_no_login_endpoint() {
        let profile = Profile::in_memory(8);
        let storage = profile.open_tab();
        let auth = session(&profile, json!({"token": "t-1", "customerId": "c-7"}));
        auth.login(&Credentials::new("ana", "secret")).await.unwrap();
        storage.set("cart", "[]").unwrap();

        clear_session(&storage, &StorageKeys::default()).unwrap();

        assert!(storage.get("token").unwrap().is_none());
        assert!(storage.get("customerId").unwrap().is_none());
        assert_eq!(storage.get("cart").unwrap().as_deref(), Some("[]"));
        assert!(!auth.refresh());
    }

    #[test]
    fn test_session_restored_from_storage() {
        let profile = Profile::in_memory(8);
        profile.open_tab().set("token", "persisted").unwrap();

        let auth = session(&profile, json!(null));
        assert!(auth.is_authenticated());
    }

    #[test]
    fn test_refresh_publishes_only_changes() {
        let profile = Profile::in_memory(8);
        let auth = session(&profile, json!(null));
        let rx = auth.subscribe();

        assert!(!auth.refresh());
        assert!(!rx.has_changed().unwrap());

        profile.open_tab().set("token", "from-other-tab").unwrap();
        assert!(auth.refresh());
        assert!(rx.has_changed().unwrap());
    }
}
