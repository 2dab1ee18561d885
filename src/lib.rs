//! # scopestore - typed, observable key-value storage
//!
//! scopestore wraps a per-origin storage area (a browser's local or session
//! storage, or an in-memory stand-in) with type-preserving encoding and a
//! publish-subscribe layer.
//!
//! ## Core Concepts
//!
//! - **Value**: a dynamically typed value; reads return the type that was written
//! - **Codec**: turns a value into a payload string plus a type tag kept in a shadow slot
//! - **EventRegistry**: named and wildcard subscriptions, one-shot and abortable
//! - **StorageSession**: runs every operation against the medium and fires its event,
//!   including for changes made by other tabs
//!
//! ## Usage
//!
//! ```rust
//! use scopestore::{
//!     any_listener, MemoryEnvironment, SessionConfig, StorageSession, SubscribeOptions, Value,
//! };
//!
//! let env = MemoryEnvironment::new();
//! let session = StorageSession::open(SessionConfig::local(), &env)?;
//!
//! session.on_any(
//!     any_listener(|event, key| println!("{event} {key:?}")),
//!     SubscribeOptions::default(),
//! );
//!
//! session.init("visits", 1)?;
//! session.set("visits", 2)?;
//! assert_eq!(session.get("visits")?, Value::Number(2.0));
//! # Ok::<(), scopestore::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod value;

// Re-export primary types at crate root for convenience
pub use codec::{Encoded, TypeTag};
pub use error::{CodecError, StoreError, StoreResult};
pub use events::{
    any_listener, listener, AbortController, AbortHookId, AbortSignal, AnyListener, EventName,
    EventRegistry, Listener, SubscribeOptions, SubscriptionId,
};
pub use session::{SessionConfig, SessionState, StorageSession};
pub use storage::{
    ChangeFeed, ChangeHandler, MemoryArea, MemoryEnvironment, MemoryStorage, StorageArea,
    StorageChange, StorageError, StorageProvider, StorageScope,
};
#[cfg(feature = "web")]
pub use storage::{WebEnvironment, WebStorage};
pub use value::Value;
