//! Timed repository proxy.
//!
//! [`TimedRepository`] wraps a repository and routes every call through a
//! [`RepositoryTimer`], so each operation produces one `repository` timing
//! tagged with the repository's identity and the operation name. Results,
//! errors and panics of the wrapped repository reach the caller unchanged.
//!
//! ```
//! use repo_timing::{RepositoryTimer, SimpleMeterRegistry};
//! use repo_timing_storage::{
//!     Config, ConfigRepository, MemoryBackend, StorageConfigRepository, TimedRepository,
//! };
//!
//! let registry = SimpleMeterRegistry::new();
//! let timer = RepositoryTimer::with_defaults(registry.clone());
//! let configs = TimedRepository::new(StorageConfigRepository::new(MemoryBackend::new()), timer);
//!
//! configs.save(Config::new("website", "https://example.com"))?;
//!
//! let timer = registry
//!     .find("repository")
//!     .tag("class", "ConfigRepository")
//!     .tag("method", "save")
//!     .single()
//!     .expect("one timer");
//! assert_eq!(timer.count, 1);
//! # Ok::<(), repo_timing_storage::StorageError>(())
//! ```

use std::{fmt, sync::Arc};

use repo_timing::{
    ComponentDescriptor, ListenableFuture, MethodInvocation, Outcome, RepositoryTimer,
    identity,
};
use uuid::Uuid;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    repository::{Config, ConfigRepository, Repository, UserBookmark, UserBookmarkRepository},
};

/// A repository whose every operation is timed.
///
/// Cheap to clone; clones share the wrapped repository and the timer.
pub struct TimedRepository<R> {
    inner: Arc<R>,
    timer: RepositoryTimer,
    descriptor: ComponentDescriptor,
}

impl<R: Repository> TimedRepository<R> {
    /// Wraps `inner`, publishing its timings through `timer`.
    pub fn new(inner: R, timer: RepositoryTimer) -> Self {
        let descriptor =
            ComponentDescriptor::proxy::<R>(R::declared_capabilities().iter().copied());
        Self { inner: Arc::new(inner), timer, descriptor }
    }
}

impl<R> TimedRepository<R> {
    /// The wrapped repository. Calls made through it are not timed.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The timer observations go through.
    pub fn timer(&self) -> &RepositoryTimer {
        &self.timer
    }

    /// How this proxy describes itself to the identity resolver.
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// Runs `call` against the wrapped repository as the operation named `operation`.
    pub fn invoke<O, F>(&self, operation: &str, call: F) -> O
    where
        O: Outcome,
        F: FnOnce(&R) -> O,
    {
        let inner = &*self.inner;
        let invocation = MethodInvocation::new(&self.descriptor, operation, move || call(inner));
        self.timer.intercept(invocation)
    }
}

impl<R> Clone for TimedRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timer: self.timer.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<R> fmt::Debug for TimedRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedRepository")
            .field("descriptor", &self.descriptor)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl<R> fmt::Display for TimedRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = identity::resolve(&self.descriptor);
        self.invoke("fmt", move |_| write!(f, "timed {name}"))
    }
}

impl<R: Repository> Repository for TimedRepository<R> {
    fn declared_capabilities() -> &'static [&'static str] {
        R::declared_capabilities()
    }
}

impl<R: ConfigRepository> ConfigRepository for TimedRepository<R> {
    fn save(&self, config: Config) -> StorageResult<Config> {
        self.invoke("save", move |repo| repo.save(config))
    }

    fn find_by_id(&self, key: &str) -> StorageResult<Option<Config>> {
        self.invoke("find_by_id", |repo| repo.find_by_id(key))
    }

    fn exists_by_id(&self, key: &str) -> StorageResult<bool> {
        self.invoke("exists_by_id", |repo| repo.exists_by_id(key))
    }

    fn find_all(&self) -> StorageResult<Vec<Config>> {
        self.invoke("find_all", |repo| repo.find_all())
    }

    fn count(&self) -> StorageResult<usize> {
        self.invoke("count", |repo| repo.count())
    }

    fn delete_by_id(&self, key: &str) -> StorageResult<()> {
        self.invoke("delete_by_id", |repo| repo.delete_by_id(key))
    }
}

impl<B: StorageBackend + 'static> TimedRepository<UserBookmarkRepository<B>> {
    /// Timed [`UserBookmarkRepository::save`].
    pub fn save(&self, bookmark: UserBookmark) -> StorageResult<UserBookmark> {
        self.invoke("save", move |repo| repo.save(bookmark))
    }

    /// Timed [`UserBookmarkRepository::save_async`]. The timing covers the
    /// call up to the moment the returned handle completes.
    pub fn save_async(
        &self,
        bookmark: UserBookmark,
    ) -> ListenableFuture<UserBookmark, StorageError> {
        self.invoke("save_async", move |repo| repo.save_async(bookmark))
    }

    /// Timed [`UserBookmarkRepository::find_latest_bookmarks`].
    pub fn find_latest_bookmarks(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<UserBookmark>> {
        self.invoke("find_latest_bookmarks", |repo| repo.find_latest_bookmarks(user_id, limit))
    }

    /// Timed [`UserBookmarkRepository::find_latest_bookmarks_async`].
    pub fn find_latest_bookmarks_async(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> ListenableFuture<Vec<UserBookmark>, StorageError> {
        self.invoke("find_latest_bookmarks_async", |repo| {
            repo.find_latest_bookmarks_async(user_id, limit)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use repo_timing::testutil::CapturingRegistry;

    use super::*;
    use crate::{memory::MemoryBackend, repository::StorageConfigRepository};

    fn timed_configs(
        registry: &Arc<CapturingRegistry>,
    ) -> TimedRepository<StorageConfigRepository<MemoryBackend>> {
        TimedRepository::new(
            StorageConfigRepository::new(MemoryBackend::new()),
            RepositoryTimer::with_defaults(Arc::clone(registry)),
        )
    }

    #[test]
    fn test_descriptor_lists_capabilities() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = timed_configs(&registry);
        assert_eq!(identity::resolve(repo.descriptor()).as_str(), "ConfigRepository");
    }

    #[test]
    fn test_marker_only_repository_uses_type_name() {
        let repo = TimedRepository::new(
            UserBookmarkRepository::new(MemoryBackend::new()),
            RepositoryTimer::with_defaults(CapturingRegistry::new()),
        );
        assert_eq!(identity::resolve(repo.descriptor()).as_str(), "UserBookmarkRepository");
    }

    #[test]
    fn test_each_call_records_one_observation() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = timed_configs(&registry);

        repo.save(Config::new("a", "1")).unwrap();
        repo.find_by_id("a").unwrap();
        repo.count().unwrap();

        let methods: Vec<String> =
            registry.observations().iter().map(|o| o.method.to_string()).collect();
        assert_eq!(methods, ["save", "find_by_id", "count"]);
        assert!(registry.observations().iter().all(|o| o.successful));
    }

    #[test]
    fn test_failure_passes_through_and_is_tagged() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = timed_configs(&registry);

        let result = repo.delete_by_id("missing");
        assert!(matches!(result, Err(StorageError::NotFound { .. })));

        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert!(!observations[0].successful);
        assert_eq!(&*observations[0].method, "delete_by_id");
    }

    #[test]
    fn test_display_is_not_timed() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = timed_configs(&registry);

        assert_eq!(repo.to_string(), "timed ConfigRepository");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_async_call_without_runtime_is_timed_as_failure() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = TimedRepository::new(
            UserBookmarkRepository::new(MemoryBackend::new()),
            RepositoryTimer::with_defaults(Arc::clone(&registry)),
        );
        let key = crate::UserBookmarkKey::new(Uuid::new_v4(), chrono::Utc::now());

        let handle = repo.save_async(UserBookmark::new(key, "https://example.com"));

        assert!(handle.is_done());
        let observations = registry.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(&*observations[0].method, "save_async");
        assert!(!observations[0].successful);
    }

    #[test]
    fn test_inner_calls_are_not_timed() {
        let registry = Arc::new(CapturingRegistry::new());
        let repo = timed_configs(&registry);

        repo.inner().save(Config::new("a", "1")).unwrap();
        assert!(registry.is_empty());
        assert_eq!(repo.clone().count().unwrap(), 1);
        assert_eq!(registry.len(), 1);
    }
}
