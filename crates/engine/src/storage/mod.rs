//! Per-profile key-value storage with cross-tab change events.
//!
//! # Architecture
//!
//! A [`Profile`] is the durable scope shared by every open tab (one browser
//! profile, one profile file). Each tab gets its own [`LocalStorage`] handle
//! onto the profile. Writes through a handle go to the backend and then emit a
//! [`StorageChange`] tagged with the writing tab; [`ForeignChanges`] delivers
//! only changes made by *other* tabs, which is how a native storage event
//! behaves.
//!
//! Reads and writes are synchronous. There are no transactions or versions:
//! when two tabs read-modify-write the same key, the last write wins.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::sync::Arc;

use cartwright_core::TabId;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded.
    #[error("Corrupt storage: {0}")]
    Corrupt(String),

    /// Value could not be encoded for storage.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A previous writer panicked while holding the lock.
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Durable string key-value slots.
///
/// Implementations must be safe to share between tabs of one profile.
pub trait StorageBackend: Send + Sync {
    /// Read a slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite a slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a slot. Deleting a missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A write made through some tab's [`LocalStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Slot that was written or removed.
    pub key: String,
    /// Tab that made the write.
    pub origin: TabId,
}

/// What a tab observes on its foreign-change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    /// Another tab wrote a slot.
    Changed(StorageChange),
    /// The receiver fell behind and skipped this many changes.
    Missed(u64),
}

/// Durable scope shared by every tab.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Profile {
    inner: Arc<ProfileInner>,
}

struct ProfileInner {
    backend: Box<dyn StorageBackend>,
    changes: broadcast::Sender<StorageChange>,
}

impl Profile {
    /// Create a profile over a backend.
    ///
    /// `capacity` bounds how many unconsumed change events each tab buffers.
    #[must_use]
    pub fn new(backend: impl StorageBackend + 'static, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(ProfileInner {
                backend: Box::new(backend),
                changes,
            }),
        }
    }

    /// Create a profile backed by process memory.
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(MemoryBackend::new(), capacity)
    }

    /// Open a new tab onto this profile.
    #[must_use]
    pub fn open_tab(&self) -> LocalStorage {
        let tab = TabId::generate();
        debug!(%tab, "Opened storage tab");
        LocalStorage {
            profile: self.clone(),
            tab,
        }
    }
}

/// One tab's handle onto a [`Profile`].
#[derive(Clone)]
pub struct LocalStorage {
    profile: Profile,
    tab: TabId,
}

impl LocalStorage {
    /// The tab this handle writes as.
    #[must_use]
    pub const fn tab(&self) -> TabId {
        self.tab
    }

    /// Read a slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.profile.inner.backend.get(key)
    }

    /// Overwrite a slot and announce it to other tabs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written; nothing is
    /// announced in that case.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.profile.inner.backend.set(key, value)?;
        self.announce(key);
        Ok(())
    }

    /// Delete a slot and announce it to other tabs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.profile.inner.backend.remove(key)?;
        self.announce(key);
        Ok(())
    }

    /// Subscribe to writes made by other tabs of the same profile.
    #[must_use]
    pub fn foreign_changes(&self) -> ForeignChanges {
        ForeignChanges {
            receiver: self.profile.inner.changes.subscribe(),
            own_tab: self.tab,
        }
    }

    fn announce(&self, key: &str) {
        // No receivers just means no other tab is listening.
        let _ = self.profile.inner.changes.send(StorageChange {
            key: key.to_string(),
            origin: self.tab,
        });
    }
}

/// Stream of storage writes made by other tabs.
///
/// Dropping it unsubscribes.
pub struct ForeignChanges {
    receiver: broadcast::Receiver<StorageChange>,
    own_tab: TabId,
}

impl ForeignChanges {
    /// Wait for the next foreign change.
    ///
    /// Returns `None` once the profile is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.origin == self.own_tab => {}
                Ok(change) => return Some(StorageEvent::Changed(change)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Storage change receiver lagged");
                    return Some(StorageEvent::Missed(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-delivered foreign change without waiting.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if change.origin == self.own_tab => {}
                Ok(change) => return Some(StorageEvent::Changed(change)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Storage change receiver lagged");
                    return Some(StorageEvent::Missed(skipped));
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tabs_share_profile_data() {
        let profile = Profile::in_memory(8);
        let a = profile.open_tab();
        let b = profile.open_tab();

        a.set("cart", "[]").unwrap();
        assert_eq!(b.get("cart").unwrap().as_deref(), Some("[]"));

        b.remove("cart").unwrap();
        assert_eq!(a.get("cart").unwrap(), None);
    }

    #[test]
    fn test_own_writes_are_not_foreign() {
        let profile = Profile::in_memory(8);
        let a = profile.open_tab();
        let b = profile.open_tab();
        let mut a_changes = a.foreign_changes();
        let mut b_changes = b.foreign_changes();

        a.set("cart", "[]").unwrap();

        assert_eq!(a_changes.try_recv(), None);
        assert_eq!(
            b_changes.try_recv(),
            Some(StorageEvent::Changed(StorageChange {
                key: "cart".to_string(),
                origin: a.tab(),
            }))
        );
        assert_eq!(b_changes.try_recv(), None);
    }

    #[test]
    fn test_lagging_receiver_reports_missed_changes() {
        let profile = Profile::in_memory(2);
        let a = profile.open_tab();
        let b = profile.open_tab();
        let mut b_changes = b.foreign_changes();

        for i in 0..5 {
            a.set("cart", &i.to_string()).unwrap();
        }

        assert!(matches!(b_changes.try_recv(), Some(StorageEvent::Missed(3))));
    }

    #[tokio::test]
    async fn test_recv_waits_for_foreign_write() {
        let profile = Profile::in_memory(8);
        let a = profile.open_tab();
        let b = profile.open_tab();
        let mut b_changes = b.foreign_changes();

        let writer = tokio::spawn(async move {
            a.set("cartItemsCount", "2").unwrap();
        });

        let event = b_changes.recv().await.unwrap();
        writer.await.unwrap();
        assert!(matches!(event, StorageEvent::Changed(change) if change.key == "cartItemsCount"));
    }
}
