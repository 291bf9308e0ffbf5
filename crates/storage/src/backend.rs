//! Storage backend trait definition.
//!
//! [`StorageBackend`] is the key/value and range-query contract the
//! repositories in this crate are written against. Calls are blocking;
//! asynchronous repository operations run them on Tokio's blocking pool.
//!
//! # Design Philosophy
//!
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Range queries supported**: Ordered prefix scans back the "latest N" lookups
//! - **Thread-safe**: Backends are `Send + Sync` and shared behind `Arc` or cheap clones
//!
//! Domain logic lives in the repository layer, not in the backends.

use std::ops::RangeBounds;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{error::StorageResult, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`get_range`](StorageBackend::get_range) | Retrieve keys in a range, in key order |
/// | [`get_range_limited`](StorageBackend::get_range_limited) | The first `limit` keys of a range |
/// | [`clear_range`](StorageBackend::clear_range) | Delete keys in a range |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use repo_timing_storage::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::new();
/// backend.set(b"key".to_vec(), b"value".to_vec())?;
/// assert_eq!(backend.get(b"key")?, Some(Bytes::from("value")));
/// # Ok::<(), repo_timing_storage::StorageError>(())
/// ```
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair, overwriting any existing value.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Deletes a key. Deleting a missing key is a no-op.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Retrieves every entry whose key falls in `range`, in ascending key order.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>>;

    /// Retrieves at most `limit` entries of `range`, in ascending key order.
    ///
    /// The provided implementation reads the whole range and truncates it.
    /// Backends that can stop scanning early should override it.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn get_range_limited<R>(&self, range: R, limit: usize) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>>,
    {
        let mut entries = self.get_range(range)?;
        entries.truncate(limit);
        Ok(entries)
    }

    /// Deletes every entry whose key falls in `range`.
    #[must_use = "storage operations may fail and errors must be handled"]
    fn clear_range<R>(&self, range: R) -> StorageResult<()>
    where
        R: RangeBounds<Vec<u8>>;

    /// Reads the value at `key` and decodes it from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`](crate::StorageError::Serialization)
    /// if the stored bytes are not valid JSON for `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encodes `value` as JSON and stores it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`](crate::StorageError::Serialization)
    /// if `value` cannot be encoded.
    fn set_json<T: Serialize + ?Sized>(&self, key: Vec<u8>, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes)
    }
}
