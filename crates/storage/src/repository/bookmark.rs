//! Per-user bookmarks, read back newest first.
//!
//! Bookmarks are stored under `user_bookmarks:{user_id}:{inverted timestamp}`.
//! The timestamp is inverted so an ascending range scan over one user's
//! prefix yields the most recent bookmark first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repo_timing::ListenableFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Repository;
use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::prefix_range,
};

const KEY_PREFIX: &str = "user_bookmarks:";

/// Primary key of a bookmark: the owning user and when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserBookmarkKey {
    /// Owner of the bookmark.
    pub user_id: Uuid,
    /// When the bookmark was taken.
    pub timestamp: DateTime<Utc>,
}

impl UserBookmarkKey {
    /// Creates a key.
    pub fn new(user_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self { user_id, timestamp }
    }

    fn user_prefix(user_id: Uuid) -> String {
        format!("{KEY_PREFIX}{user_id}:")
    }

    fn storage_key(&self) -> Vec<u8> {
        // Order-preserving map of i64 onto u64, then inverted.
        let micros = self.timestamp.timestamp_micros() as u64 ^ (1 << 63);
        format!("{}{:020}", Self::user_prefix(self.user_id), u64::MAX - micros).into_bytes()
    }
}

/// A bookmarked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBookmark {
    /// Owner and time of the bookmark.
    pub key: UserBookmarkKey,
    /// Bookmarked address.
    pub url: String,
}

impl UserBookmark {
    /// Creates a bookmark.
    pub fn new(key: UserBookmarkKey, url: impl Into<String>) -> Self {
        Self { key, url: url.into() }
    }
}

/// Stores bookmarks and lists a user's most recent ones.
///
/// The `*_async` operations run on Tokio's blocking pool and return a
/// [`ListenableFuture`]. Called outside a Tokio runtime they return a handle
/// that has already failed.
#[derive(Debug)]
pub struct UserBookmarkRepository<B> {
    backend: Arc<B>,
}

impl<B> Clone for UserBookmarkRepository<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend) }
    }
}

impl<B: StorageBackend + 'static> Repository for UserBookmarkRepository<B> {}

impl<B: StorageBackend + 'static> UserBookmarkRepository<B> {
    /// Creates a repository over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Inserts or replaces `bookmark`, returning the stored value.
    pub fn save(&self, bookmark: UserBookmark) -> StorageResult<UserBookmark> {
        save(&*self.backend, bookmark)
    }

    /// Asynchronous [`save`](Self::save), run on Tokio's blocking pool.
    ///
    /// Outside a Tokio runtime the returned handle is already failed with
    /// [`StorageError::Internal`] and nothing is written.
    pub fn save_async(
        &self,
        bookmark: UserBookmark,
    ) -> ListenableFuture<UserBookmark, StorageError> {
        let backend = Arc::clone(&self.backend);
        on_blocking_pool(move || save(&*backend, bookmark))
    }

    /// Returns at most `limit` of the user's bookmarks, newest first.
    pub fn find_latest_bookmarks(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<UserBookmark>> {
        find_latest(&*self.backend, user_id, limit)
    }

    /// Asynchronous [`find_latest_bookmarks`](Self::find_latest_bookmarks), failing
    /// the same way as [`save_async`](Self::save_async) outside a runtime.
    pub fn find_latest_bookmarks_async(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> ListenableFuture<Vec<UserBookmark>, StorageError> {
        let backend = Arc::clone(&self.backend);
        on_blocking_pool(move || find_latest(&*backend, user_id, limit))
    }
}

fn on_blocking_pool<T, F>(work: F) -> ListenableFuture<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    ListenableFuture::spawn_blocking(work)
        .unwrap_or_else(|err| ListenableFuture::completed(Err(StorageError::from(err))))
}

fn save<B: StorageBackend>(backend: &B, bookmark: UserBookmark) -> StorageResult<UserBookmark> {
    backend.set_json(bookmark.key.storage_key(), &bookmark)?;
    Ok(bookmark)
}

fn find_latest<B: StorageBackend>(
    backend: &B,
    user_id: Uuid,
    limit: usize,
) -> StorageResult<Vec<UserBookmark>> {
    let prefix = UserBookmarkKey::user_prefix(user_id);
    backend
        .get_range_limited(prefix_range(prefix.as_bytes()), limit)?
        .into_iter()
        .map(|kv| serde_json::from_slice(&kv.value).map_err(StorageError::from))
        .collect()
}
