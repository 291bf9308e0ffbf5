//! Shared test utilities for timed repository testing.
//!
//! This module provides helpers for wiring repositories to a fresh
//! [`SimpleMeterRegistry`], building bookmark fixtures and asserting on
//! [`StorageResult`] values. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! repo-timing-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use repo_timing_storage::testutil::{timed_bookmark_repository, timed_config_repository};
//! ```

use chrono::{Duration, Utc};
use repo_timing::{RepositoryTimer, SimpleMeterRegistry};
use uuid::Uuid;

use crate::{
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
    proxy::TimedRepository,
    repository::{StorageConfigRepository, UserBookmark, UserBookmarkKey, UserBookmarkRepository},
};

/// Bookmarked URLs used by the bookmark scenarios, newest first once saved
/// through [`aged_bookmark`] with an age of `index + 1` days.
pub const BOOKMARK_URLS: [&str; 9] = [
    "https://www.rust-lang.org",
    "https://www.github.com",
    "https://crates.io",
    "https://docs.rs",
    "https://www.wikipedia.org",
    "https://tokio.rs",
    "https://www.github.com",
    "https://blog.rust-lang.org",
    "https://this-week-in-rust.org",
];

/// A config repository over a fresh [`MemoryBackend`], timed into a fresh registry.
pub fn timed_config_repository()
-> (TimedRepository<StorageConfigRepository<MemoryBackend>>, SimpleMeterRegistry) {
    let registry = SimpleMeterRegistry::new();
    let timer = RepositoryTimer::with_defaults(registry.clone());
    (TimedRepository::new(StorageConfigRepository::new(MemoryBackend::new()), timer), registry)
}

/// A bookmark repository over a fresh [`MemoryBackend`], timed into a fresh registry.
pub fn timed_bookmark_repository()
-> (TimedRepository<UserBookmarkRepository<MemoryBackend>>, SimpleMeterRegistry) {
    timed_bookmark_repository_with(MemoryBackend::new())
}

/// A bookmark repository over `backend`, timed into a fresh registry.
pub fn timed_bookmark_repository_with(
    backend: MemoryBackend,
) -> (TimedRepository<UserBookmarkRepository<MemoryBackend>>, SimpleMeterRegistry) {
    let registry = SimpleMeterRegistry::new();
    let timer = RepositoryTimer::with_defaults(registry.clone());
    (TimedRepository::new(UserBookmarkRepository::new(backend), timer), registry)
}

/// A bookmark for `user_id` taken `age_days` days ago.
#[must_use]
pub fn aged_bookmark(user_id: Uuid, age_days: i64, url: &str) -> UserBookmark {
    UserBookmark::new(UserBookmarkKey::new(user_id, Utc::now() - Duration::days(age_days)), url)
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use repo_timing_storage::assert_not_found;
/// use repo_timing_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::NotFound { key: "missing".into() });
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is a `NotFound` error.
pub fn is_not_found<T>(result: &StorageResult<T>) -> bool {
    result.as_ref().is_err_and(StorageError::is_not_found)
}
