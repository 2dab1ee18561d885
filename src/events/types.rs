//! Event and listener types.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::signal::AbortSignal;

/// Name of an event fired by a storage session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    /// First write of a key.
    Init,
    Get,
    /// Overwrite of an existing key.
    Set,
    Remove,
    Clear,
}

impl EventName {
    /// All event names, in declaration order.
    pub const ALL: [Self; 5] = [Self::Init, Self::Get, Self::Set, Self::Remove, Self::Clear];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Clear => "clear",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown event name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event name '{0}'")]
pub struct ParseEventNameError(pub String);

impl FromStr for EventName {
    type Err = ParseEventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ParseEventNameError(s.to_string()))
    }
}

/// Callback for a named subscription. Receives the key, if the event has one.
///
/// Listeners are compared by pointer identity: keep a clone of the `Arc` to
/// unsubscribe later.
pub type Listener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Callback for a wildcard subscription. Receives the event name and key.
pub type AnyListener = Arc<dyn Fn(EventName, Option<&str>) + Send + Sync>;

/// Wraps a closure as a `Listener`.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(Option<&str>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as an `AnyListener`.
pub fn any_listener<F>(f: F) -> AnyListener
where
    F: Fn(EventName, Option<&str>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Unique identifier for a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options accepted by `subscribe` and `subscribe_any`.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Removes the subscription when aborted.
    pub signal: Option<AbortSignal>,
    /// Removes the subscription after its first invocation.
    pub once: bool,
}

impl SubscribeOptions {
    /// Options for a one-shot subscription.
    #[must_use]
    pub fn once() -> Self {
        Self {
            signal: None,
            once: true,
        }
    }

    /// Ties the subscription to `signal`.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}
