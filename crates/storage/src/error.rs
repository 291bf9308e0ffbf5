//! Errors reported by backends and repositories.
//!
//! Every call in this crate fails with a [`StorageError`]. The timed
//! repository proxy hands these back untouched; they only decide whether the
//! call's timing is tagged `successful=false`.
//!
//! - [`StorageError::NotFound`]: a repository was asked to act on an entry that does not exist
//! - [`StorageError::Serialization`]: a record could not be encoded or decoded as JSON
//! - [`StorageError::Internal`]: the backend itself failed
//! - [`StorageError::Cancelled`]: an asynchronous operation was dropped before it finished
//!
//! ```
//! use repo_timing_storage::{StorageError, StorageResult};
//!
//! fn require(found: Option<u32>, key: &str) -> StorageResult<u32> {
//!     found.ok_or_else(|| StorageError::not_found(key))
//! }
//!
//! assert!(matches!(require(None, "config:theme"), Err(StorageError::NotFound { .. })));
//! ```

use std::sync::Arc;

use repo_timing::{Cancelled, NoRuntime};
use thiserror::Error;

/// Shareable error used as the `source` of a [`StorageError`].
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Shorthand for results of backend and repository calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a backend or repository call.
///
/// `Clone` so the same failure can be handed to every completion listener of
/// an asynchronous operation. Match with a wildcard arm; variants may be added.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No entry is stored under `key`.
    #[error("Key not found: {key}")]
    NotFound {
        /// Key the caller asked for.
        key: String,
    },

    /// A record could not be converted to or from its stored JSON form.
    #[error("Serialization error: {message}")]
    Serialization {
        /// What went wrong.
        message: String,
        /// Error reported by the codec.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend failed to carry out the call.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
        /// Error reported by the backend, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// An asynchronous operation was dropped before producing a result.
    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    /// A [`NotFound`](Self::NotFound) error for `key`.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// An [`Internal`](Self::Internal) error without a source.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// An [`Internal`](Self::Internal) error caused by `source`.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` for [`NotFound`](Self::NotFound).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<Cancelled> for StorageError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<NoRuntime> for StorageError {
    fn from(err: NoRuntime) -> Self {
        Self::internal_with_source("asynchronous operation needs a Tokio runtime", err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: err.to_string(), source: Some(Arc::new(err)) }
    }
}
