//! "Cart changed" notification topic.
//!
//! A [`CartSubscription`] wakes on two sources:
//! - same-tab events, published by [`Notifier::notify_cart_changed`] after
//!   every cart save in this tab;
//! - storage changes to the cart slots written by other tabs of the profile.
//!
//! Events carry no cart data. Subscribers must re-read the store when woken,
//! so a view never renders a stale snapshot delivered by an event.
//!
//! Authentication changes are a separate topic (see [`crate::auth`]).

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::storage::{ForeignChanges, LocalStorage, StorageEvent};

/// Where a wake-up came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// A mutation in this tab.
    ThisTab,
    /// A storage write by another tab.
    OtherTab,
}

/// Same-tab change signal. Carries nothing; subscribers re-read the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CartChanged;

/// Publisher for the "cart changed" topic of one tab.
///
/// Cheaply cloneable; all clones publish to the same subscribers.
#[derive(Clone)]
pub struct Notifier {
    storage: LocalStorage,
    sender: broadcast::Sender<CartChanged>,
    watched_keys: Arc<[String]>,
}

impl Notifier {
    /// Create the topic for a tab.
    ///
    /// `watched_keys` are the storage slots whose foreign writes count as a
    /// cart change.
    #[must_use]
    pub fn new(storage: LocalStorage, watched_keys: Vec<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            storage,
            sender,
            watched_keys: watched_keys.into(),
        }
    }

    /// Wake every subscriber in this tab.
    ///
    /// Returns how many subscribers were woken.
    pub fn notify_cart_changed(&self) -> usize {
        let woken = self
            .sender
            .send(CartChanged)
            .unwrap_or(0);
        debug!(tab = %self.storage.tab(), woken, "Cart change broadcast");
        woken
    }

    /// Subscribe to both wake sources.
    ///
    /// Dropping the subscription unsubscribes from both.
    #[must_use]
    pub fn subscribe(&self) -> CartSubscription {
        CartSubscription {
            local: self.sender.subscribe(),
            foreign: self.storage.foreign_changes(),
            watched_keys: Arc::clone(&self.watched_keys),
        }
    }

    /// Number of live subscriptions in this tab.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscriber's view of the "cart changed" topic.
pub struct CartSubscription {
    local: broadcast::Receiver<CartChanged>,
    foreign: ForeignChanges,
    watched_keys: Arc<[String]>,
}

impl CartSubscription {
    /// Wait for the next wake-up from either source.
    ///
    /// A lagged receiver still counts as a wake-up: missed events carried no
    /// data, so one re-read covers all of them. Returns `None` once the
    /// tab's notifier is gone.
    pub async fn changed(&mut self) -> Option<ChangeSource> {
        loop {
            tokio::select! {
                local = self.local.recv() => {
                    return match local {
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            Some(ChangeSource::ThisTab)
                        }
                        Err(broadcast::error::RecvError::Closed) => None,
                    };
                }
                foreign = self.foreign.recv() => match foreign {
                    Some(event) if self.is_cart_event(&event) => {
                        return Some(ChangeSource::OtherTab);
                    }
                    Some(_) => {}
                    None => return None,
                },
            }
        }
    }

    /// Take an already-delivered wake-up without waiting.
    pub fn try_changed(&mut self) -> Option<ChangeSource> {
        match self.local.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                return Some(ChangeSource::ThisTab);
            }
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {}
        }
        while let Some(event) = self.foreign.try_recv() {
            if self.is_cart_event(&event) {
                return Some(ChangeSource::OtherTab);
            }
        }
        None
    }

    /// Discard every pending wake-up, returning how many were pending.
    ///
    /// Call after a re-read so a burst of writes costs one refresh.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.try_changed().is_some() {
            drained += 1;
        }
        drained
    }

    fn is_cart_event(&self, event: &StorageEvent) -> bool {
        match event {
            StorageEvent::Changed(change) => self.watched_keys.contains(&change.key),
            StorageEvent::Missed(_) => true,
        }
    }
}
