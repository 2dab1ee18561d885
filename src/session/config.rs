//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::storage::StorageScope;

/// How a session binds to its storage medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Storage area the session is bound to.
    pub scope: StorageScope,
    /// Max buffered cross-context changes before new ones are dropped.
    pub change_queue_capacity: usize,
    /// Install the cross-context change listener when a medium is attached.
    pub watch_changes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scope: StorageScope::Local,
            change_queue_capacity: 1024,
            watch_changes: true,
        }
    }
}

impl SessionConfig {
    /// Config bound to the local area.
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    /// Config bound to the session area.
    #[must_use]
    pub fn session() -> Self {
        Self {
            scope: StorageScope::Session,
            ..Self::default()
        }
    }
}
