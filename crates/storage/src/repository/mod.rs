//! Repositories: domain-level data access on top of a [`StorageBackend`].
//!
//! Each repository implements the [`Repository`] marker and lists the
//! capabilities it exposes through [`Repository::declared_capabilities`]. The
//! timed proxy in [`crate::proxy`] reads that list to decide which name the
//! repository's timings are tagged with.
//!
//! | Repository | Capabilities | Timings tagged as |
//! |------------|--------------|-------------------|
//! | [`StorageConfigRepository`] | `ConfigRepository`, `Repository` | `ConfigRepository` |
//! | [`UserBookmarkRepository`] | `Repository` | `UserBookmarkRepository` |
//!
//! [`StorageBackend`]: crate::StorageBackend

mod bookmark;
mod config;

pub use bookmark::{UserBookmark, UserBookmarkKey, UserBookmarkRepository};
pub use config::{Config, ConfigRepository, StorageConfigRepository};

/// Capability name every repository declares.
pub const REPOSITORY_MARKER: &str = "Repository";

/// Marker for data-access components.
pub trait Repository: Send + Sync + 'static {
    /// Capabilities this repository exposes, most specific first, ending with
    /// [`REPOSITORY_MARKER`].
    fn declared_capabilities() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[REPOSITORY_MARKER]
    }
}
