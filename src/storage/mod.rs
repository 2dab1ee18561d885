//! Storage medium abstraction.
//!
//! A storage area is a flat string-to-string map scoped to an origin, plus a
//! notification channel for changes made by other execution contexts. The
//! in-memory backend is always available; the browser backend sits behind the
//! `web` feature.

pub mod keys;
mod memory;
mod traits;
#[cfg(feature = "web")]
mod web;

pub use keys::{is_shadow_key, primary_key_of, shadow_key, SHADOW_PREFIX, SHADOW_SUFFIX};
pub use memory::{ContextId, MemoryArea, MemoryEnvironment, MemoryStorage};
pub use traits::{
    ChangeFeed, ChangeHandler, StorageArea, StorageChange, StorageError, StorageProvider,
    StorageScope,
};
#[cfg(feature = "web")]
pub use web::{WebEnvironment, WebStorage};
