//! In-memory storage backend implementation.
//!
//! [`MemoryBackend`] keeps entries in a [`BTreeMap`] behind a
//! [`parking_lot::RwLock`]. It backs the repositories in tests and
//! development, and can simulate a slow store with
//! [`MemoryBackend::with_latency`] so timings have something to measure.
//!
//! # Example
//!
//! ```
//! use repo_timing_storage::{MemoryBackend, StorageBackend};
//!
//! let backend = MemoryBackend::new();
//! backend.set(b"greeting".to_vec(), b"hello".to_vec())?;
//! let value = backend.get(b"greeting")?;
//! assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), repo_timing_storage::StorageError>(())
//! ```
//!
//! # Performance Characteristics
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | get | O(log n) |
//! | set | O(log n) |
//! | delete | O(log n) |
//! | get_range | O(log n + k) where k is result size |
//! | get_range_limited | O(log n + min(k, limit)) |
//!
//! # Fail Points
//!
//! With the `failpoints` feature, `memory-get`, `memory-set`, `memory-delete`
//! and `memory-get-range` can be configured through the `fail` crate to make
//! the matching operation return [`StorageError::Internal`].

use std::{
    collections::BTreeMap,
    ops::{Bound, RangeBounds},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the same data that sleeps for `latency` before
    /// every operation.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }

    /// Copies out at most `limit` entries of `range`, in key order.
    fn scan<R>(&self, range: &R, limit: usize) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>>,
    {
        fail_point!("memory-get-range", |_| {
            Err(StorageError::internal("injected failure in get_range"))
        });
        self.simulate_latency();

        let Some(bounds) = slice_bounds(range) else {
            return Ok(Vec::new());
        };
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>(bounds)
            .take(limit)
            .map(|(k, v)| KeyValue::new(Bytes::copy_from_slice(k), v.clone()))
            .collect())
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.len())
            .field("latency", &self.latency)
            .finish()
    }
}

/// Maps owned range bounds onto slice bounds, or `None` for a range that
/// cannot contain any key. `BTreeMap::range` panics on such ranges.
fn slice_bounds<R>(range: &R) -> Option<(Bound<&[u8]>, Bound<&[u8]>)>
where
    R: RangeBounds<Vec<u8>>,
{
    let start = match range.start_bound() {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    };
    let end = match range.end_bound() {
        Bound::Included(b) => Bound::Included(b.as_slice()),
        Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    };

    let empty = match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e)) => s >= e,
        _ => false,
    };
    if empty { None } else { Some((start, end)) }
}

impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        fail_point!("memory-get", |_| Err(StorageError::internal("injected failure in get")));
        self.simulate_latency();
        Ok(self.data.read().get(key).cloned())
    }

    #[tracing::instrument(
        skip(self, key, value),
        fields(key_len = key.len(), value_len = value.len())
    )]
    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        fail_point!("memory-set", |_| Err(StorageError::internal("injected failure in set")));
        self.simulate_latency();
        self.data.write().insert(key, Bytes::from(value));
        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        fail_point!("memory-delete", |_| Err(StorageError::internal("injected failure in delete")));
        self.simulate_latency();
        self.data.write().remove(key);
        Ok(())
    }

    #[tracing::instrument(skip(self, range))]
    fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>>,
    {
        self.scan(&range, usize::MAX)
    }

    #[tracing::instrument(skip(self, range))]
    fn get_range_limited<R>(&self, range: R, limit: usize) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>>,
    {
        self.scan(&range, limit)
    }

    #[tracing::instrument(skip(self, range))]
    fn clear_range<R>(&self, range: R) -> StorageResult<()>
    where
        R: RangeBounds<Vec<u8>>,
    {
        self.simulate_latency();

        let Some(bounds) = slice_bounds(&range) else {
            return Ok(());
        };
        let mut data = self.data.write();
        let keys: Vec<Vec<u8>> = data.range::<[u8], _>(bounds).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            data.remove(key);
        }
        Ok(())
    }
}
