//! Storage sessions.
//!
//! A `StorageSession` binds one storage scope to an event registry. Every
//! public operation performs its storage call and then fires the matching
//! event. Changes made by other contexts arrive through the medium's change
//! feed and are fired through the same registry, so subscribers cannot tell a
//! local write from a remote one.

/// Session configuration.
pub mod config;
/// Cross-context change classification.
pub mod translator;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codec::{self, Encoded};
use crate::error::{StoreError, StoreResult};
use crate::events::{
    AnyListener, EventName, EventRegistry, Listener, SubscribeOptions, SubscriptionId,
};
use crate::storage::{
    is_shadow_key, shadow_key, ChangeFeed, ChangeHandler, StorageArea, StorageChange,
    StorageProvider, StorageScope,
};
use crate::value::Value;

pub use config::SessionConfig;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No storage medium resolved yet.
    Uninitialized,
    /// Medium resolved; every operation is functional.
    Active,
    /// The cross-context listener was torn down. Local operations still work.
    Detached,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Detached => "detached",
        };
        f.write_str(s)
    }
}

/// Typed, observable access to one storage scope.
///
/// # Examples
///
/// ```
/// use scopestore::{listener, EventName, MemoryEnvironment, SessionConfig, StorageSession, SubscribeOptions, Value};
///
/// let env = MemoryEnvironment::new();
/// let session = StorageSession::open(SessionConfig::local(), &env)?;
///
/// session.on(EventName::Init, listener(|key| println!("created {key:?}")), SubscribeOptions::default());
/// session.init("count", 42)?;
/// assert_eq!(session.get("count")?, Value::Number(42.0));
/// # Ok::<(), scopestore::StoreError>(())
/// ```
pub struct StorageSession {
    config: SessionConfig,
    registry: EventRegistry,
    storage: Option<Arc<dyn StorageArea>>,
    feed: Option<ChangeFeed>,
    state: SessionState,
}

impl StorageSession {
    /// A session with no storage medium yet.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            registry: EventRegistry::new(),
            storage: None,
            feed: None,
            state: SessionState::Uninitialized,
        }
    }

    /// Resolves the configured scope through `provider`.
    ///
    /// When the provider has no area for the scope the session stays
    /// `Uninitialized`; this is not an error.
    ///
    /// # Errors
    /// Fails if the change listener cannot be installed on the resolved medium.
    pub fn open(config: SessionConfig, provider: &dyn StorageProvider) -> StoreResult<Self> {
        let scope = config.scope;
        let mut session = Self::new(config);
        match provider.resolve(scope) {
            Some(storage) => session.attach(storage)?,
            None => debug!(%scope, "no storage area available; session uninitialized"),
        }
        Ok(session)
    }

    /// A session over an explicit medium.
    ///
    /// # Errors
    /// Fails if the change listener cannot be installed.
    pub fn with_storage(config: SessionConfig, storage: Arc<dyn StorageArea>) -> StoreResult<Self> {
        let mut session = Self::new(config);
        session.attach(storage)?;
        Ok(session)
    }

    /// Binds the session to `storage` and installs the change listener.
    ///
    /// A previously installed listener is replaced, so there is never more than one.
    /// Mediums that can call back on receipt fire cross-context events
    /// straight away. Others buffer changes until [`StorageSession::process_changes`].
    ///
    /// # Errors
    /// Fails if the change listener cannot be installed; the session is left unchanged.
    pub fn attach(&mut self, storage: Arc<dyn StorageArea>) -> StoreResult<()> {
        let feed = if self.config.watch_changes {
            let registry = self.registry.clone();
            let scope = self.config.scope;
            let handler: ChangeHandler = Box::new(move |change: &StorageChange| {
                dispatch(&registry, scope, change);
            });
            match storage.listen(handler)? {
                Some(feed) => Some(feed),
                None => Some(storage.watch(self.config.change_queue_capacity)?),
            }
        } else {
            None
        };
        self.feed = feed;
        self.storage = Some(storage);
        self.state = SessionState::Active;
        debug!(
            scope = %self.config.scope,
            watching = self.feed.is_some(),
            queued = self.feed.as_ref().is_some_and(ChangeFeed::is_queued),
            "session attached"
        );
        Ok(())
    }

    /// Tears down the change listener.
    pub fn detach(&mut self) {
        self.feed = None;
        if self.state == SessionState::Active {
            self.state = SessionState::Detached;
            debug!(scope = %self.config.scope, "session detached");
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn scope(&self) -> StorageScope {
        self.config.scope
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The registry events are fired through.
    #[must_use]
    pub const fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    fn require(&self, operation: &'static str) -> StoreResult<&Arc<dyn StorageArea>> {
        self.storage
            .as_ref()
            .ok_or_else(|| StoreError::Uninitialized {
                scope: self.config.scope,
                operation,
            })
    }

    /// Writes the payload and tag slots as a pair.
    ///
    /// If the tag cannot be written the primary slot is put back as it was.
    fn write(storage: &dyn StorageArea, key: &str, value: &Value) -> StoreResult<()> {
        let Encoded { payload, tag } = codec::encode(value);
        let previous = storage.get_item(key)?;
        storage.set_item(key, &payload)?;
        if let Err(err) = storage.set_item(&shadow_key(key), tag.as_str()) {
            warn!(key, error = %err, "tag slot write failed; restoring primary slot");
            Self::restore(storage, key, previous.as_deref());
            return Err(err.into());
        }
        Ok(())
    }

    /// Deletes the payload and tag slots as a pair.
    ///
    /// If the tag cannot be deleted the primary slot is put back as it was.
    fn delete(storage: &dyn StorageArea, key: &str) -> StoreResult<()> {
        let previous = storage.get_item(key)?;
        storage.remove_item(key)?;
        if let Err(err) = storage.remove_item(&shadow_key(key)) {
            warn!(key, error = %err, "tag slot delete failed; restoring primary slot");
            Self::restore(storage, key, previous.as_deref());
            return Err(err.into());
        }
        Ok(())
    }

    fn restore(storage: &dyn StorageArea, key: &str, previous: Option<&str>) {
        let restored = match previous {
            Some(payload) => storage.set_item(key, payload),
            None => storage.remove_item(key),
        };
        if let Err(err) = restored {
            warn!(key, error = %err, "primary slot could not be restored");
        }
    }

    /// Writes the first value of `key` and fires `init`.
    ///
    /// There is no existence check; at the storage level this is the same as `set`.
    ///
    /// # Errors
    /// Fails if no storage medium is resolved or the medium rejects the write.
    pub fn init(&self, key: &str, value: impl Into<Value>) -> StoreResult<()> {
        let storage = self.require("init")?;
        Self::write(storage.as_ref(), key, &value.into())?;
        debug!(key, scope = %self.config.scope, "init");
        self.registry.fire(EventName::Init, Some(key));
        Ok(())
    }

    /// Overwrites `key` and fires `set`.
    ///
    /// Without a storage medium the write is skipped but the event still fires.
    ///
    /// # Errors
    /// Fails if the medium rejects the write.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> StoreResult<()> {
        match &self.storage {
            Some(storage) => Self::write(storage.as_ref(), key, &value.into())?,
            None => debug!(key, "no storage area; set not persisted"),
        }
        debug!(key, scope = %self.config.scope, "set");
        self.registry.fire(EventName::Set, Some(key));
        Ok(())
    }

    /// Reads and decodes `key`, then fires `get`.
    ///
    /// A key that was never written reads as `Value::Undefined`.
    ///
    /// # Errors
    /// Fails if no storage medium is resolved, or with `StoreError::Decode` if
    /// the stored payload does not match its type tag.
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        let storage = self.require("get")?;
        let payload = storage.get_item(key)?;
        let tag = storage.get_item(&shadow_key(key))?;
        let value = codec::decode(payload.as_deref(), tag.as_deref()).map_err(|source| {
            warn!(key, error = %source, "stored value could not be decoded");
            StoreError::Decode {
                key: key.to_string(),
                source,
            }
        })?;
        debug!(key, scope = %self.config.scope, "get");
        self.registry.fire(EventName::Get, Some(key));
        Ok(value)
    }

    /// Reads `key` into a concrete type. Fires `get`.
    ///
    /// Returns `None` for a missing key.
    ///
    /// # Errors
    /// Fails like `get`, or with `StoreError::Decode` if the value does not have the shape of `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let value = self.get(key)?;
        if value.is_undefined() {
            return Ok(None);
        }
        value
            .deserialize_into()
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    /// Deletes `key` and its shadow slot, then fires `remove`.
    ///
    /// Without a storage medium the delete is skipped but the event still fires.
    ///
    /// # Errors
    /// Fails if the medium rejects the delete.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        match &self.storage {
            Some(storage) => Self::delete(storage.as_ref(), key)?,
            None => debug!(key, "no storage area; remove not persisted"),
        }
        debug!(key, scope = %self.config.scope, "remove");
        self.registry.fire(EventName::Remove, Some(key));
        Ok(())
    }

    /// Deletes every slot in the scope, then fires `clear` without a key.
    ///
    /// # Errors
    /// Fails if the medium rejects the clear.
    pub fn clear(&self) -> StoreResult<()> {
        match &self.storage {
            Some(storage) => storage.clear()?,
            None => debug!("no storage area; clear not persisted"),
        }
        debug!(scope = %self.config.scope, "clear");
        self.registry.fire(EventName::Clear, None);
        Ok(())
    }

    /// Returns true if `key` has a stored value. Fires nothing.
    ///
    /// # Errors
    /// Fails if no storage medium is resolved.
    pub fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let storage = self.require("contains_key")?;
        Ok(storage.get_item(key)?.is_some())
    }

    /// Every stored key, without shadow slots. Fires nothing.
    ///
    /// # Errors
    /// Fails if no storage medium is resolved.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let storage = self.require("keys")?;
        Ok(storage
            .keys()?
            .into_iter()
            .filter(|k| !is_shadow_key(k))
            .collect())
    }

    /// Subscribes `listener` to `event`.
    pub fn on(
        &self,
        event: EventName,
        listener: Listener,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        self.registry.subscribe(event, listener, options)
    }

    /// Alias of [`StorageSession::on`].
    pub fn add_event_listener(
        &self,
        event: EventName,
        listener: Listener,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        self.on(event, listener, options)
    }

    /// Removes the first subscription of `listener` to `event`.
    pub fn off(&self, event: EventName, listener: &Listener) -> bool {
        self.registry.unsubscribe(event, listener)
    }

    /// Alias of [`StorageSession::off`].
    pub fn remove_event_listener(&self, event: EventName, listener: &Listener) -> bool {
        self.off(event, listener)
    }

    /// Subscribes `listener` to every event.
    pub fn on_any(&self, listener: AnyListener, options: SubscribeOptions) -> SubscriptionId {
        self.registry.subscribe_any(listener, options)
    }

    /// Removes the first wildcard subscription of `listener`.
    pub fn off_any(&self, listener: &AnyListener) -> bool {
        self.registry.unsubscribe_any(listener)
    }

    /// Translates a change made by another context and fires the result.
    ///
    /// Returns the event fired, or `None` if the change was ignored.
    pub fn handle_change(&self, change: &StorageChange) -> Option<EventName> {
        dispatch(&self.registry, self.config.scope, change)
    }

    /// Handles every queued cross-context change. Returns the number of events fired.
    ///
    /// Only queued feeds need this. A medium that delivers on receipt (the
    /// browser backend) has already fired its changes, and this returns 0.
    pub fn process_changes(&self) -> usize {
        let Some(feed) = &self.feed else {
            return 0;
        };
        let mut fired = 0;
        while let Some(change) = feed.try_next() {
            if self.handle_change(&change).is_some() {
                fired += 1;
            }
        }
        fired
    }

    /// Waits up to `timeout` for a cross-context change, then handles every
    /// pending one. Returns the number of events fired.
    ///
    /// Returns 0 at once when there is no queued feed.
    pub fn wait_for_changes(&self, timeout: Duration) -> usize {
        let Some(feed) = &self.feed else {
            return 0;
        };
        let Some(first) = feed.next_timeout(timeout) else {
            return 0;
        };
        let fired = usize::from(self.handle_change(&first).is_some());
        fired + self.process_changes()
    }

    /// Number of cross-context changes waiting to be processed.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.feed.as_ref().map_or(0, ChangeFeed::pending)
    }
}

fn dispatch(
    registry: &EventRegistry,
    scope: StorageScope,
    change: &StorageChange,
) -> Option<EventName> {
    match translator::classify(change) {
        Some((event, key)) => {
            debug!(%event, key, %scope, "cross-context change");
            registry.fire(event, Some(key));
            Some(event)
        }
        None => {
            debug!(key = ?change.key, %scope, "cross-context change ignored");
            None
        }
    }
}

impl std::fmt::Debug for StorageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("feed", &self.feed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::events::{any_listener, listener};
    use crate::storage::{MemoryEnvironment, MemoryStorage, StorageError};

    fn session() -> (StorageSession, MemoryStorage) {
        let storage = MemoryStorage::new();
        let session =
            StorageSession::with_storage(SessionConfig::local(), Arc::new(storage.clone())).unwrap();
        (session, storage)
    }

    /// Memory storage whose tag slots can be made read-only.
    struct TagLockedStorage {
        inner: MemoryStorage,
        locked: AtomicBool,
    }

    impl TagLockedStorage {
        fn new(inner: MemoryStorage) -> Arc<Self> {
            Arc::new(Self {
                inner,
                locked: AtomicBool::new(false),
            })
        }

        fn lock_tags(&self) {
            self.locked.store(true, Ordering::SeqCst);
        }

        fn check(&self, key: &str) -> Result<(), StorageError> {
            if self.locked.load(Ordering::SeqCst) && is_shadow_key(key) {
                return Err(StorageError::Backend("quota exceeded".to_string()));
            }
            Ok(())
        }
    }

    impl StorageArea for TagLockedStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.check(key)?;
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.check(key)?;
            self.inner.remove_item(key)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys()
        }

        fn watch(&self, capacity: usize) -> Result<ChangeFeed, StorageError> {
            self.inner.watch(capacity)
        }
    }

    /// Memory storage that hands remote changes to the session's handler.
    struct DirectStorage {
        inner: MemoryStorage,
        handler: Rc<RefCell<Option<ChangeHandler>>>,
    }

    impl DirectStorage {
        fn emit(&self, change: &StorageChange) -> bool {
            match self.handler.borrow().as_ref() {
                Some(handler) => {
                    handler(change);
                    true
                }
                None => false,
            }
        }
    }

    impl StorageArea for DirectStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys()
        }

        fn watch(&self, capacity: usize) -> Result<ChangeFeed, StorageError> {
            self.inner.watch(capacity)
        }

        fn listen(&self, handler: ChangeHandler) -> Result<Option<ChangeFeed>, StorageError> {
            *self.handler.borrow_mut() = Some(handler);
            let slot = Rc::clone(&self.handler);
            Ok(Some(ChangeFeed::direct(move || {
                slot.borrow_mut().take();
            })))
        }
    }

    #[test]
    fn writes_primary_and_shadow_slots() {
        let (session, storage) = session();
        session.init("count", 42).unwrap();

        let slots = storage.area().snapshot();
        assert_eq!(slots.get("count").map(String::as_str), Some("42"));
        assert_eq!(slots.get("$$count_data").map(String::as_str), Some("number"));
    }

    #[test]
    fn remove_deletes_both_slots() {
        let (session, storage) = session();
        session.init("k", "v").unwrap();
        session.remove("k").unwrap();
        assert!(storage.area().is_empty());
    }

    #[test]
    fn get_missing_key_is_undefined() {
        let (session, _) = session();
        assert_eq!(session.get("absent").unwrap(), Value::Undefined);
        assert_eq!(session.get_as::<u32>("absent").unwrap(), None);
    }

    #[test]
    fn get_without_shadow_slot_returns_raw_payload() {
        let (session, storage) = session();
        storage.set_item("foreign", "123").unwrap();
        assert_eq!(session.get("foreign").unwrap(), Value::from("123"));
    }

    #[test]
    fn corrupt_object_payload_is_a_decode_error() {
        let (session, storage) = session();
        let fired = Arc::new(Mutex::new(0));
        let fired_clone = Arc::clone(&fired);
        session.on(
            EventName::Get,
            listener(move |_| *fired_clone.lock().unwrap() += 1),
            SubscribeOptions::default(),
        );

        storage.set_item("broken", "{oops").unwrap();
        storage.set_item("$$broken_data", "object").unwrap();

        let err = session.get("broken").unwrap_err();
        assert!(err.is_decode());
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    #[test]
    fn keys_skip_shadow_slots() {
        let (session, _) = session();
        session.init("a", 1).unwrap();
        session.init("b", true).unwrap();
        assert_eq!(session.keys().unwrap(), vec!["a", "b"]);
        assert!(session.contains_key("a").unwrap());
        assert!(!session.contains_key("c").unwrap());
    }

    #[test]
    fn uninitialized_session_fails_init_and_get() {
        let session = StorageSession::open(SessionConfig::local(), &MemoryEnvironment::headless())
            .unwrap();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.init("k", 1).unwrap_err().is_uninitialized());
        assert!(session.get("k").unwrap_err().is_uninitialized());
        assert!(session.keys().unwrap_err().is_uninitialized());
    }

    #[test]
    fn uninitialized_session_still_fires_tolerant_operations() {
        let session = StorageSession::new(SessionConfig::session());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        session.on_any(
            any_listener(move |event, key| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((event, key.map(str::to_string)));
            }),
            SubscribeOptions::default(),
        );

        session.set("k", 1).unwrap();
        session.remove("k").unwrap();
        session.clear().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (EventName::Set, Some("k".to_string())),
                (EventName::Remove, Some("k".to_string())),
                (EventName::Clear, None),
            ]
        );
    }

    #[test]
    fn attach_and_detach_transitions() {
        let mut session = StorageSession::new(SessionConfig::local());
        let storage = MemoryStorage::new();
        session.attach(Arc::new(storage.clone())).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(storage.area().watcher_count(), 1);

        // Re-attaching keeps a single listener.
        session.attach(Arc::new(storage.clone())).unwrap();
        assert_eq!(storage.area().watcher_count(), 1);

        session.detach();
        assert_eq!(session.state(), SessionState::Detached);
        assert_eq!(storage.area().watcher_count(), 0);

        session.set("still", "works").unwrap();
        assert_eq!(session.get("still").unwrap(), Value::from("works"));
    }

    #[test]
    fn watch_changes_disabled_installs_no_listener() {
        let storage = MemoryStorage::new();
        let config = SessionConfig {
            watch_changes: false,
            ..SessionConfig::default()
        };
        let session = StorageSession::with_storage(config, Arc::new(storage.clone())).unwrap();
        assert_eq!(storage.area().watcher_count(), 0);
        assert_eq!(session.process_changes(), 0);
    }

    #[test]
    fn failed_tag_write_leaves_no_untagged_payload() {
        let storage = TagLockedStorage::new(MemoryStorage::new());
        storage.lock_tags();
        let session = StorageSession::with_storage(SessionConfig::local(), storage.clone()).unwrap();
        let fired = Arc::new(Mutex::new(0));
        let fired_clone = Arc::clone(&fired);
        session.on_any(
            any_listener(move |_, _| *fired_clone.lock().unwrap() += 1),
            SubscribeOptions::default(),
        );

        let err = session.init("n", 42).unwrap_err();
        assert!(err.is_storage());
        assert!(storage.inner.area().is_empty());
        assert_eq!(session.get("n").unwrap(), Value::Undefined);
        // Only the `get` above fired.
        assert_eq!(*fired.lock().unwrap(), 1);
    }

    #[test]
    fn failed_tag_write_restores_previous_payload() {
        let storage = TagLockedStorage::new(MemoryStorage::new());
        let session = StorageSession::with_storage(SessionConfig::local(), storage.clone()).unwrap();
        session.init("n", 42).unwrap();

        storage.lock_tags();
        assert!(session.set("n", "replaced").unwrap_err().is_storage());

        let slots = storage.inner.area().snapshot();
        assert_eq!(slots["n"], "42");
        assert_eq!(slots["$$n_data"], "number");
        assert_eq!(session.get("n").unwrap(), Value::Number(42.0));
    }

    #[test]
    fn failed_tag_delete_restores_previous_payload() {
        let storage = TagLockedStorage::new(MemoryStorage::new());
        let session = StorageSession::with_storage(SessionConfig::local(), storage.clone()).unwrap();
        session.init("flag", true).unwrap();

        storage.lock_tags();
        assert!(session.remove("flag").unwrap_err().is_storage());
        assert_eq!(session.get("flag").unwrap(), Value::Bool(true));
    }

    #[test]
    fn direct_medium_fires_remote_changes_on_receipt() {
        let storage = Arc::new(DirectStorage {
            inner: MemoryStorage::new(),
            handler: Rc::default(),
        });
        let mut session =
            StorageSession::with_storage(SessionConfig::local(), storage.clone()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        session.on_any(
            any_listener(move |event, key| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((event, key.map(str::to_string)));
            }),
            SubscribeOptions::default(),
        );

        assert!(storage.emit(&StorageChange::new("theme", None, Some("dark"))));
        assert!(storage.emit(&StorageChange::new("$$theme_data", None, Some("string"))));
        assert!(storage.emit(&StorageChange::new("theme", Some("dark"), Some("light"))));

        // Delivered without any polling step.
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (EventName::Init, Some("theme".to_string())),
                (EventName::Set, Some("theme".to_string())),
            ]
        );
        assert_eq!(session.pending_changes(), 0);
        assert_eq!(session.process_changes(), 0);
        assert_eq!(storage.inner.area().watcher_count(), 0);

        session.detach();
        assert!(!storage.emit(&StorageChange::new("theme", Some("light"), None)));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
