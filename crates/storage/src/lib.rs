//! Storage backends and timed repositories for `repo-timing`.
//!
//! This crate provides the data-access side of repository timing: a
//! key/value [`StorageBackend`], an in-memory implementation, two
//! repositories built on top of it and the [`TimedRepository`] proxy that
//! routes every repository call through a [`RepositoryTimer`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application code                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                TimedRepository<R> (proxy)                   │
//! │      RepositoryTimer::intercept → SimpleMeterRegistry       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Repository Layer                         │
//! │     StorageConfigRepository │ UserBookmarkRepository        │
//! │         (Domain logic, serialization, key layout)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   StorageBackend trait                      │
//! │        (get, set, delete, get_range, clear_range)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      MemoryBackend                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use repo_timing::{RepositoryTimer, SimpleMeterRegistry};
//! use repo_timing_storage::{
//!     Config, ConfigRepository, MemoryBackend, StorageConfigRepository, TimedRepository,
//! };
//!
//! let registry = SimpleMeterRegistry::new();
//! let configs = TimedRepository::new(
//!     StorageConfigRepository::new(MemoryBackend::new()),
//!     RepositoryTimer::with_defaults(registry.clone()),
//! );
//!
//! configs.save(Config::new("website", "https://example.com"))?;
//! assert!(configs.find_by_id("website")?.is_some());
//!
//! // One timer per (class, method, successful) combination.
//! assert_eq!(registry.meters().len(), 2);
//! # Ok::<(), repo_timing_storage::StorageError>(())
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. The timed proxy never wraps
//! or swallows errors; a failed call is tagged `successful=false` and the
//! error is returned as-is.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (timed repository
//!   fixtures, bookmark builders, assertion macros). Enable this in `[dev-dependencies]` for
//!   integration tests.
//! - **`failpoints`**: Compiles the [`MemoryBackend`] fail points in.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod proxy;
pub mod repository;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use proxy::TimedRepository;
pub use repository::{
    Config, ConfigRepository, REPOSITORY_MARKER, Repository, StorageConfigRepository,
    UserBookmark, UserBookmarkKey, UserBookmarkRepository,
};
pub use types::{KeyValue, PrefixRange, prefix_range};
