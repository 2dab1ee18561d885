//! Error types for scopestore.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! failure that actually happened.

use thiserror::Error;

use crate::storage::{StorageError, StorageScope};

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload tagged 'object' is not valid JSON: {0}")]
    InvalidObject(#[source] serde_json::Error),

    #[error("value cannot be represented: {0}")]
    Unrepresentable(#[source] serde_json::Error),
}

/// Top-level error type for scopestore.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("{scope} storage is not available; cannot {operation}")]
    Uninitialized {
        scope: StorageScope,
        operation: &'static str,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl StoreError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if a stored payload could not be decoded.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns true if the operation needed a storage area that was never resolved.
    #[must_use]
    pub const fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized { .. })
    }

    /// Returns true if the storage medium itself failed.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for scopestore operations.
pub type StoreResult<T> = Result<T, StoreError>;
