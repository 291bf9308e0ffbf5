//! Common types used across storage operations.

use std::ops::{Bound, RangeBounds};

use bytes::Bytes;

/// Key-value pair returned from range queries.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use repo_timing_storage::KeyValue;
///
/// let kv = KeyValue::new(Bytes::from("config:website"), Bytes::from("https://example.com"));
/// assert_eq!(kv.key, Bytes::from("config:website"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// Half-open range covering every key that starts with `prefix`.
///
/// The upper bound is the prefix with its last non-`0xFF` byte incremented.
/// A prefix made only of `0xFF` bytes (or an empty prefix) has no upper bound.
///
/// ```
/// use std::ops::{Bound, RangeBounds};
///
/// use repo_timing_storage::prefix_range;
///
/// let range = prefix_range(b"config:");
/// assert!(range.contains(&b"config:website".to_vec()));
/// assert!(!range.contains(&b"configs".to_vec()));
/// assert_eq!(range.end_bound(), Bound::Excluded(&b"config;".to_vec()));
/// ```
pub fn prefix_range(prefix: &[u8]) -> PrefixRange {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return PrefixRange { start: prefix.to_vec(), end: Some(end) };
        }
    }
    PrefixRange { start: prefix.to_vec(), end: None }
}

/// The key range returned by [`prefix_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRange {
    start: Vec<u8>,
    end: Option<Vec<u8>>,
}

impl RangeBounds<Vec<u8>> for PrefixRange {
    fn start_bound(&self) -> Bound<&Vec<u8>> {
        Bound::Included(&self.start)
    }

    fn end_bound(&self) -> Bound<&Vec<u8>> {
        match &self.end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        }
    }
}
