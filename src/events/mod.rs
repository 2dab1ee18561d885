//! Event subscriptions for storage operations.
//!
//! Every session operation fires one event through an `EventRegistry`. Subscribers
//! register for a single `EventName` or for every event (wildcard), optionally
//! as one-shot subscriptions or tied to an `AbortSignal`.

/// Abort controller and signal used to cancel subscriptions.
pub mod signal;
/// Subscription storage and synchronous dispatch.
pub mod registry;
/// Event names, listener types and subscription options.
pub mod types;

pub use registry::EventRegistry;
pub use signal::{AbortController, AbortHookId, AbortSignal};
pub use types::{
    any_listener, listener, AnyListener, EventName, Listener, ParseEventNameError, SubscribeOptions,
    SubscriptionId,
};
