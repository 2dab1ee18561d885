//! Abstract storage traits.
//!
//! These traits define the contract a storage medium must satisfy:
//! - string slots addressed by key, with get/set/remove/clear
//! - a change feed for mutations made by other execution contexts
//!
//! The traits carry no `Send`/`Sync` bound because browser storage handles are
//! confined to the thread that created them.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The medium exists but refused access.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Which per-origin storage area a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Persists across browsing contexts of the same origin.
    #[default]
    Local,
    /// Lives for a single top-level browsing context.
    Session,
}

impl StorageScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Session => "session",
        }
    }
}

impl std::fmt::Display for StorageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change made to a storage area by another execution context.
///
/// `key` is `None` when the whole area was cleared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageChange {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageChange {
    #[must_use]
    pub fn new(key: impl Into<String>, old_value: Option<&str>, new_value: Option<&str>) -> Self {
        Self {
            key: Some(key.into()),
            old_value: old_value.map(str::to_string),
            new_value: new_value.map(str::to_string),
        }
    }

    /// The key-less record emitted when an area is cleared.
    #[must_use]
    pub fn cleared() -> Self {
        Self::default()
    }
}

/// Callback a medium invokes for each change made by another context.
pub type ChangeHandler = Box<dyn Fn(&StorageChange)>;

/// A medium's change subscription.
///
/// A queued feed buffers changes until they are drained. A direct feed hands
/// each change to a [`ChangeHandler`] on receipt and never buffers. Dropping
/// either kind detaches it from the medium.
pub struct ChangeFeed {
    rx: Option<Receiver<StorageChange>>,
    on_drop: Option<Box<dyn FnOnce()>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new(rx: Receiver<StorageChange>) -> Self {
        Self {
            rx: Some(rx),
            on_drop: None,
        }
    }

    /// A queued feed that runs `detach` when dropped.
    #[must_use]
    pub fn with_detach<F>(rx: Receiver<StorageChange>, detach: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            rx: Some(rx),
            on_drop: Some(Box::new(detach)),
        }
    }

    /// A direct feed: changes already go to a handler, `detach` runs on drop.
    #[must_use]
    pub fn direct<F>(detach: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            rx: None,
            on_drop: Some(Box::new(detach)),
        }
    }

    /// Returns true if changes wait in a queue until drained.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        self.rx.is_some()
    }

    /// The next pending change, without blocking.
    #[must_use]
    pub fn try_next(&self) -> Option<StorageChange> {
        self.rx.as_ref()?.try_recv().ok()
    }

    /// Waits up to `timeout` for the next change.
    ///
    /// Returns `None` on timeout, once the medium has gone away, or at once
    /// for a direct feed.
    #[must_use]
    pub fn next_timeout(&self, timeout: Duration) -> Option<StorageChange> {
        match self.rx.as_ref()?.recv_timeout(timeout) {
            Ok(change) => Some(change),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of changes waiting to be processed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.as_ref().map_or(0, Receiver::len)
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(detach) = self.on_drop.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("queued", &self.is_queued())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// A per-origin string storage area.
pub trait StorageArea {
    /// Get the value stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every key in the area.
    fn clear(&self) -> Result<(), StorageError>;

    /// All keys currently stored, including shadow slots.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Subscribe to changes made by other execution contexts.
    ///
    /// At most `capacity` changes are buffered; later ones are dropped until the
    /// feed is drained.
    fn watch(&self, capacity: usize) -> Result<ChangeFeed, StorageError>;

    /// Deliver changes made by other execution contexts to `handler` as they arrive.
    ///
    /// Returns `None` when the medium can only queue changes, in which case
    /// the caller falls back to [`StorageArea::watch`].
    fn listen(&self, handler: ChangeHandler) -> Result<Option<ChangeFeed>, StorageError> {
        drop(handler);
        Ok(None)
    }
}

/// Resolves the storage area for a scope, if the environment has one.
pub trait StorageProvider {
    fn resolve(&self, scope: StorageScope) -> Option<Arc<dyn StorageArea>>;
}
