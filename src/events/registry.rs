//! Subscription registry and synchronous dispatch.
//!
//! Firing takes a snapshot of matching subscriptions and invokes them without
//! holding the lock, so callbacks may subscribe, unsubscribe, or fire again.
//! Before each invocation the subscription is checked against the live list:
//! one removed earlier in the same fire is skipped, and a one-shot subscription
//! is removed before its callback runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::signal::{AbortHookId, AbortSignal};
use super::types::{AnyListener, EventName, Listener, SubscribeOptions, SubscriptionId};

type AbortLink = Option<(AbortSignal, AbortHookId)>;

struct NamedEntry {
    id: SubscriptionId,
    event: EventName,
    listener: Listener,
    once: bool,
    abort: AbortLink,
}

struct WildcardEntry {
    id: SubscriptionId,
    listener: AnyListener,
    once: bool,
    abort: AbortLink,
}

#[derive(Default)]
struct Subscriptions {
    named: Vec<NamedEntry>,
    wildcard: Vec<WildcardEntry>,
}

impl Subscriptions {
    fn remove_named(&mut self, id: SubscriptionId) -> Option<AbortLink> {
        let pos = self.named.iter().position(|s| s.id == id)?;
        Some(self.named.remove(pos).abort)
    }

    fn remove_wildcard(&mut self, id: SubscriptionId) -> Option<AbortLink> {
        let pos = self.wildcard.iter().position(|s| s.id == id)?;
        Some(self.wildcard.remove(pos).abort)
    }
}

fn lock(inner: &Mutex<Subscriptions>) -> MutexGuard<'_, Subscriptions> {
    // Callbacks never run under this lock, so a poisoned guard still holds a consistent list.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops the abort hook of a removed subscription. Must run without the registry lock.
fn release(link: AbortLink) {
    if let Some((signal, hook)) = link {
        signal.remove_hook(hook);
    }
}

fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Named and wildcard subscriptions, fired in registration order.
///
/// Cloning yields another handle to the same subscriptions.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<Mutex<Subscriptions>>,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `event`.
    ///
    /// Subscribing with an already-aborted signal registers nothing.
    pub fn subscribe(
        &self,
        event: EventName,
        listener: Listener,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        if options.signal.as_ref().is_some_and(AbortSignal::is_aborted) {
            trace!(%event, %id, "signal already aborted; subscription skipped");
            return id;
        }

        lock(&self.inner).named.push(NamedEntry {
            id,
            event,
            listener,
            once: options.once,
            abort: None,
        });

        if let Some(signal) = options.signal {
            let weak = Arc::downgrade(&self.inner);
            let hook = signal.on_abort(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).remove_named(id);
                }
            });
            let linked = {
                let mut subs = lock(&self.inner);
                match subs.named.iter_mut().find(|s| s.id == id) {
                    Some(entry) => {
                        entry.abort = Some((signal.clone(), hook));
                        true
                    }
                    None => false,
                }
            };
            if !linked {
                // Aborted between registration and linking.
                signal.remove_hook(hook);
            }
        }
        id
    }

    /// Subscribes `listener` to every event.
    pub fn subscribe_any(&self, listener: AnyListener, options: SubscribeOptions) -> SubscriptionId {
        let id = SubscriptionId::new();
        if options.signal.as_ref().is_some_and(AbortSignal::is_aborted) {
            trace!(%id, "signal already aborted; wildcard subscription skipped");
            return id;
        }

        lock(&self.inner).wildcard.push(WildcardEntry {
            id,
            listener,
            once: options.once,
            abort: None,
        });

        if let Some(signal) = options.signal {
            let weak = Arc::downgrade(&self.inner);
            let hook = signal.on_abort(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).remove_wildcard(id);
                }
            });
            let linked = {
                let mut subs = lock(&self.inner);
                match subs.wildcard.iter_mut().find(|s| s.id == id) {
                    Some(entry) => {
                        entry.abort = Some((signal.clone(), hook));
                        true
                    }
                    None => false,
                }
            };
            if !linked {
                // Aborted between registration and linking.
                signal.remove_hook(hook);
            }
        }
        id
    }

    /// Removes the first subscription of `listener` to `event`.
    ///
    /// Returns false if there was none.
    pub fn unsubscribe(&self, event: EventName, listener: &Listener) -> bool {
        let removed = {
            let mut subs = lock(&self.inner);
            subs.named
                .iter()
                .position(|s| s.event == event && same_listener(&s.listener, listener))
                .map(|pos| subs.named.remove(pos).abort)
        };
        removed.map(release).is_some()
    }

    /// Removes the first wildcard subscription of `listener`.
    pub fn unsubscribe_any(&self, listener: &AnyListener) -> bool {
        let removed = {
            let mut subs = lock(&self.inner);
            subs.wildcard
                .iter()
                .position(|s| same_listener(&s.listener, listener))
                .map(|pos| subs.wildcard.remove(pos).abort)
        };
        removed.map(release).is_some()
    }

    /// Invokes the subscribers of `event` with `key`, then every wildcard
    /// subscriber with `(event, key)`.
    pub fn fire(&self, event: EventName, key: Option<&str>) {
        let (named, wildcard) = {
            let subs = lock(&self.inner);
            let named: Vec<(SubscriptionId, Listener, bool)> = subs
                .named
                .iter()
                .filter(|s| s.event == event)
                .map(|s| (s.id, Arc::clone(&s.listener), s.once))
                .collect();
            let wildcard: Vec<(SubscriptionId, AnyListener, bool)> = subs
                .wildcard
                .iter()
                .map(|s| (s.id, Arc::clone(&s.listener), s.once))
                .collect();
            (named, wildcard)
        };

        trace!(
            %event,
            key = ?key,
            named = named.len(),
            wildcard = wildcard.len(),
            "firing event"
        );

        for (id, listener, once) in named {
            let live = if once {
                let removed = lock(&self.inner).remove_named(id);
                removed.map(release).is_some()
            } else {
                lock(&self.inner).named.iter().any(|s| s.id == id)
            };
            if live {
                listener(key);
            }
        }

        for (id, listener, once) in wildcard {
            let live = if once {
                let removed = lock(&self.inner).remove_wildcard(id);
                removed.map(release).is_some()
            } else {
                lock(&self.inner).wildcard.iter().any(|s| s.id == id)
            };
            if live {
                listener(event, key);
            }
        }
    }

    /// Number of named subscriptions for `event`.
    #[must_use]
    pub fn listener_count(&self, event: EventName) -> usize {
        lock(&self.inner)
            .named
            .iter()
            .filter(|s| s.event == event)
            .count()
    }

    /// Number of wildcard subscriptions.
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        lock(&self.inner).wildcard.len()
    }

    /// Returns true if there are no subscriptions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let subs = lock(&self.inner);
        subs.named.is_empty() && subs.wildcard.is_empty()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subs = lock(&self.inner);
        f.debug_struct("EventRegistry")
            .field("named", &subs.named.len())
            .field("wildcard", &subs.wildcard.len())
            .finish()
    }
}
