//! In-memory storage backend.
//!
//! A `MemoryArea` holds the slots of one storage scope and can be shared by any
//! number of execution contexts. Each `MemoryStorage` is one context's view of
//! the area: its writes are announced to watchers of every other context, never
//! to its own, the way a browser delivers `storage` events to other tabs only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::traits::{
    ChangeFeed, StorageArea, StorageChange, StorageError, StorageProvider, StorageScope,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Identifies one execution context (a tab, a worker) sharing an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Watcher {
    id: Uuid,
    context: ContextId,
    tx: Sender<StorageChange>,
}

#[derive(Debug, Default)]
struct AreaState {
    slots: BTreeMap<String, String>,
    watchers: Vec<Watcher>,
}

/// Slots of one storage scope, shared between contexts.
#[derive(Debug, Clone, Default)]
pub struct MemoryArea {
    state: Arc<Mutex<AreaState>>,
    dropped_changes: Arc<AtomicU64>,
}

impl MemoryArea {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a view of this area from a new execution context.
    #[must_use]
    pub fn connect(&self) -> MemoryStorage {
        self.connect_as(ContextId::new())
    }

    /// Opens a view of this area from an existing execution context.
    #[must_use]
    pub fn connect_as(&self, context: ContextId) -> MemoryStorage {
        MemoryStorage {
            area: self.clone(),
            context,
        }
    }

    /// Copy of every raw slot, shadow slots included.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .clone()
    }

    /// Number of raw slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live watchers across all contexts.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .watchers
            .len()
    }

    /// Changes discarded because a watcher's queue was full.
    #[must_use]
    pub fn dropped_changes(&self) -> u64 {
        self.dropped_changes.load(Ordering::Relaxed)
    }

    fn lock(&self, context: &'static str) -> Result<MutexGuard<'_, AreaState>, StorageError> {
        self.state.lock().map_err(|_| lock_err(context))
    }

    fn broadcast(&self, state: &mut AreaState, origin: ContextId, change: &StorageChange) {
        let dropped = &self.dropped_changes;
        state.watchers.retain(|w| {
            if w.context == origin {
                return true;
            }
            match w.tx.try_send(change.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(key = ?change.key, watcher = %w.id, "change feed full; notification dropped");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }
}

/// One execution context's view of a `MemoryArea`.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    area: MemoryArea,
    context: ContextId,
}

impl MemoryStorage {
    /// A standalone area with a single context.
    #[must_use]
    pub fn new() -> Self {
        MemoryArea::new().connect()
    }

    /// The shared area behind this view.
    #[must_use]
    pub const fn area(&self) -> &MemoryArea {
        &self.area
    }

    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let state = self.area.lock("get_item")?;
        Ok(state.slots.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.area.lock("set_item")?;
        let old = state.slots.insert(key.to_string(), value.to_string());
        // Rewriting an identical value is not a change.
        if old.as_deref() != Some(value) {
            let change = StorageChange::new(key, old.as_deref(), Some(value));
            self.area.broadcast(&mut state, self.context, &change);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.area.lock("remove_item")?;
        if let Some(old) = state.slots.remove(key) {
            let change = StorageChange::new(key, Some(old.as_str()), None);
            self.area.broadcast(&mut state, self.context, &change);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.area.lock("clear")?;
        if !state.slots.is_empty() {
            state.slots.clear();
            self.area
                .broadcast(&mut state, self.context, &StorageChange::cleared());
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let state = self.area.lock("keys")?;
        Ok(state.slots.keys().cloned().collect())
    }

    fn watch(&self, capacity: usize) -> Result<ChangeFeed, StorageError> {
        let (tx, rx) = bounded(capacity.max(1));
        let id = Uuid::new_v4();
        self.area.lock("watch")?.watchers.push(Watcher {
            id,
            context: self.context,
            tx,
        });
        debug!(watcher = %id, "memory change feed attached");

        let state: Weak<Mutex<AreaState>> = Arc::downgrade(&self.area.state);
        Ok(ChangeFeed::with_detach(rx, move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.watchers.retain(|w| w.id != id);
                debug!(watcher = %id, "memory change feed detached");
            }
        }))
    }
}

/// An in-memory browsing context exposing a local and a session area.
///
/// Tabs opened from the same environment share its local area; each tab gets a
/// session area of its own.
#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
    local: Option<MemoryArea>,
    session: Option<MemoryArea>,
    context: ContextId,
}

impl MemoryEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: Some(MemoryArea::new()),
            session: Some(MemoryArea::new()),
            context: ContextId::new(),
        }
    }

    /// An environment without any storage, like a script running outside a browser.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            local: None,
            session: None,
            context: ContextId::new(),
        }
    }

    /// Opens another tab: same local area, fresh session area, new context.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        Self {
            local: self.local.clone(),
            session: self.session.as_ref().map(|_| MemoryArea::new()),
            context: ContextId::new(),
        }
    }

    /// The area backing `scope`, if any.
    #[must_use]
    pub fn area(&self, scope: StorageScope) -> Option<&MemoryArea> {
        match scope {
            StorageScope::Local => self.local.as_ref(),
            StorageScope::Session => self.session.as_ref(),
        }
    }

    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for MemoryEnvironment {
    fn resolve(&self, scope: StorageScope) -> Option<Arc<dyn StorageArea>> {
        let area = self.area(scope)?;
        Some(Arc::new(area.connect_as(self.context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_remove_clear() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.keys().unwrap(), vec!["a", "b"]);

        storage.remove_item("a").unwrap();
        storage.remove_item("missing").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.clear().unwrap();
        assert!(storage.area().is_empty());
    }

    #[test]
    fn changes_reach_other_contexts_only() {
        let area = MemoryArea::new();
        let tab_a = area.connect();
        let tab_b = area.connect();
        let feed_a = tab_a.watch(8).unwrap();
        let feed_b = tab_b.watch(8).unwrap();

        tab_a.set_item("k", "v1").unwrap();
        tab_a.set_item("k", "v2").unwrap();
        tab_a.remove_item("k").unwrap();

        assert!(feed_a.try_next().is_none());
        assert_eq!(feed_b.try_next().unwrap(), StorageChange::new("k", None, Some("v1")));
        assert_eq!(
            feed_b.try_next().unwrap(),
            StorageChange::new("k", Some("v1"), Some("v2"))
        );
        assert_eq!(feed_b.try_next().unwrap(), StorageChange::new("k", Some("v2"), None));
        assert!(feed_b.try_next().is_none());
    }

    #[test]
    fn unchanged_writes_and_missing_removes_are_silent() {
        let area = MemoryArea::new();
        let writer = area.connect();
        let feed = area.connect().watch(8).unwrap();

        writer.set_item("k", "same").unwrap();
        writer.set_item("k", "same").unwrap();
        writer.remove_item("absent").unwrap();

        assert_eq!(feed.pending(), 1);
    }

    #[test]
    fn clear_emits_keyless_change_when_not_empty() {
        let area = MemoryArea::new();
        let writer = area.connect();
        let feed = area.connect().watch(8).unwrap();

        writer.clear().unwrap();
        assert!(feed.try_next().is_none());

        writer.set_item("k", "v").unwrap();
        writer.clear().unwrap();
        let _ = feed.try_next();
        assert_eq!(feed.try_next().unwrap(), StorageChange::cleared());
    }

    #[test]
    fn full_feed_drops_and_counts() {
        let area = MemoryArea::new();
        let writer = area.connect();
        let feed = area.connect().watch(1).unwrap();

        writer.set_item("a", "1").unwrap();
        writer.set_item("b", "2").unwrap();

        assert_eq!(feed.pending(), 1);
        assert_eq!(area.dropped_changes(), 1);
    }

    #[test]
    fn dropping_feed_detaches_watcher() {
        let area = MemoryArea::new();
        let feed = area.connect().watch(4).unwrap();
        assert_eq!(area.watcher_count(), 1);
        drop(feed);
        assert_eq!(area.watcher_count(), 0);
    }

    #[test]
    fn environment_tabs_share_local_but_not_session() {
        let env = MemoryEnvironment::new();
        let tab = env.open_tab();

        let local = env.resolve(StorageScope::Local).unwrap();
        let session = env.resolve(StorageScope::Session).unwrap();
        local.set_item("shared", "yes").unwrap();
        session.set_item("private", "yes").unwrap();

        let tab_local = tab.resolve(StorageScope::Local).unwrap();
        let tab_session = tab.resolve(StorageScope::Session).unwrap();
        assert_eq!(tab_local.get_item("shared").unwrap().as_deref(), Some("yes"));
        assert_eq!(tab_session.get_item("private").unwrap(), None);
    }

    #[test]
    fn headless_environment_resolves_nothing() {
        let env = MemoryEnvironment::headless();
        assert!(env.resolve(StorageScope::Local).is_none());
        assert!(env.resolve(StorageScope::Session).is_none());
        assert!(env.open_tab().resolve(StorageScope::Local).is_none());
    }
}
