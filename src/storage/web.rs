//! Browser storage backend over `window.localStorage` / `window.sessionStorage`.

use std::sync::Arc;

use crossbeam_channel::{bounded, TrySendError};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Storage, StorageEvent, Window};

use super::traits::{
    ChangeFeed, ChangeHandler, StorageArea, StorageChange, StorageError, StorageProvider,
    StorageScope,
};

fn js_err(context: &'static str, err: &JsValue) -> StorageError {
    StorageError::Backend(format!("{context}: {err:?}"))
}

/// A browser storage area.
#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: Storage,
    scope: StorageScope,
}

impl WebStorage {
    /// The storage area for `scope`, if the window exposes one.
    ///
    /// Returns `None` when access is denied (for example in some private modes).
    #[must_use]
    pub fn from_window(window: &Window, scope: StorageScope) -> Option<Self> {
        let storage = match scope {
            StorageScope::Local => window.local_storage(),
            StorageScope::Session => window.session_storage(),
        }
        .ok()
        .flatten()?;
        Some(Self { storage, scope })
    }

    #[must_use]
    pub const fn scope(&self) -> StorageScope {
        self.scope
    }

    /// Installs a window `storage` listener that forwards changes to this area.
    ///
    /// Returns the hook that removes the listener again.
    fn install<F>(&self, mut on_change: F) -> Result<impl FnOnce() + 'static, StorageError>
    where
        F: FnMut(StorageChange) + 'static,
    {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no global window".to_string()))?;

        // The window's `storage` event covers both areas; keep only ours.
        let area = self.storage.clone();
        let handler = Closure::<dyn FnMut(StorageEvent)>::new(move |event: StorageEvent| {
            if event.storage_area().as_ref() != Some(&area) {
                return;
            }
            on_change(StorageChange {
                key: event.key(),
                old_value: event.old_value(),
                new_value: event.new_value(),
            });
        });

        window
            .add_event_listener_with_callback("storage", handler.as_ref().unchecked_ref())
            .map_err(|e| js_err("addEventListener", &e))?;
        debug!(scope = %self.scope, "storage event listener installed");

        let scope = self.scope;
        Ok(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", handler.as_ref().unchecked_ref());
            drop(handler);
            debug!(%scope, "storage event listener removed");
        })
    }
}

impl StorageArea for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|e| js_err("getItem", &e))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| js_err("setItem", &e))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage
            .remove_item(key)
            .map_err(|e| js_err("removeItem", &e))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.storage.clear().map_err(|e| js_err("clear", &e))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let len = self.storage.length().map_err(|e| js_err("length", &e))?;
        (0..len)
            .filter_map(|i| self.storage.key(i).transpose())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| js_err("key", &e))
    }

    fn watch(&self, capacity: usize) -> Result<ChangeFeed, StorageError> {
        let (tx, rx) = bounded(capacity.max(1));
        let detach = self.install(move |change| {
            if let Err(TrySendError::Full(change)) = tx.try_send(change) {
                warn!(key = ?change.key, "browser change feed full; notification dropped");
            }
        })?;
        Ok(ChangeFeed::with_detach(rx, detach))
    }

    fn listen(&self, handler: ChangeHandler) -> Result<Option<ChangeFeed>, StorageError> {
        let detach = self.install(move |change| handler(&change))?;
        Ok(Some(ChangeFeed::direct(detach)))
    }
}

/// Resolves storage areas from the global `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebEnvironment;

impl StorageProvider for WebEnvironment {
    fn resolve(&self, scope: StorageScope) -> Option<Arc<dyn StorageArea>> {
        let window = web_sys::window()?;
        let storage = WebStorage::from_window(&window, scope)?;
        Some(Arc::new(storage))
    }
}
