//! Key/value configuration entries.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{REPOSITORY_MARKER, Repository};
use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::prefix_range,
};

const KEY_PREFIX: &str = "config:";

/// A named configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Unique key of the entry.
    pub key: String,
    /// Stored value.
    pub value: String,
}

impl Config {
    /// Creates a configuration entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// CRUD access to [`Config`] entries, keyed by [`Config::key`].
pub trait ConfigRepository: Repository {
    /// Inserts or replaces `config`, returning the stored entry.
    fn save(&self, config: Config) -> StorageResult<Config>;

    /// Looks up the entry stored under `key`.
    fn find_by_id(&self, key: &str) -> StorageResult<Option<Config>>;

    /// Returns `true` if an entry is stored under `key`.
    fn exists_by_id(&self, key: &str) -> StorageResult<bool>;

    /// Returns every entry, ordered by key.
    fn find_all(&self) -> StorageResult<Vec<Config>>;

    /// Number of stored entries.
    fn count(&self) -> StorageResult<usize>;

    /// Removes the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such entry.
    fn delete_by_id(&self, key: &str) -> StorageResult<()>;
}

/// [`ConfigRepository`] storing entries as JSON under `config:{key}`.
#[derive(Debug, Clone)]
pub struct StorageConfigRepository<B> {
    backend: B,
}

impl<B: StorageBackend> StorageConfigRepository<B> {
    /// Creates a repository over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn storage_key(key: &str) -> Vec<u8> {
        format!("{KEY_PREFIX}{key}").into_bytes()
    }
}

impl<B: StorageBackend + 'static> Repository for StorageConfigRepository<B> {
    fn declared_capabilities() -> &'static [&'static str] {
        &["ConfigRepository", REPOSITORY_MARKER]
    }
}

impl<B: StorageBackend + 'static> ConfigRepository for StorageConfigRepository<B> {
    fn save(&self, config: Config) -> StorageResult<Config> {
        self.backend.set_json(Self::storage_key(&config.key), &config)?;
        Ok(config)
    }

    fn find_by_id(&self, key: &str) -> StorageResult<Option<Config>> {
        self.backend.get_json(&Self::storage_key(key))
    }

    fn exists_by_id(&self, key: &str) -> StorageResult<bool> {
        Ok(self.backend.get(&Self::storage_key(key))?.is_some())
    }

    fn find_all(&self) -> StorageResult<Vec<Config>> {
        self.backend
            .get_range(prefix_range(KEY_PREFIX.as_bytes()))?
            .into_iter()
            .map(|kv| serde_json::from_slice(&kv.value).map_err(StorageError::from))
            .collect()
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.backend.get_range(prefix_range(KEY_PREFIX.as_bytes()))?.len())
    }

    fn delete_by_id(&self, key: &str) -> StorageResult<()> {
        let storage_key = Self::storage_key(key);
        if self.backend.get(&storage_key)?.is_none() {
            debug!(key, "delete of missing config entry");
            return Err(StorageError::not_found(key));
        }
        self.backend.delete(&storage_key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn repository() -> StorageConfigRepository<MemoryBackend> {
        StorageConfigRepository::new(MemoryBackend::new())
    }

    #[test]
    fn test_save_then_find() {
        let repo = repository();
        repo.save(Config::new("website", "https://example.com")).unwrap();

        let found = repo.find_by_id("website").unwrap().unwrap();
        assert_eq!(found.value, "https://example.com");
        assert!(repo.exists_by_id("website").unwrap());
        assert!(!repo.exists_by_id("missing").unwrap());
        assert_eq!(repo.find_by_id("missing").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let repo = repository();
        repo.save(Config::new("theme", "light")).unwrap();
        repo.save(Config::new("theme", "dark")).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.find_by_id("theme").unwrap().unwrap().value, "dark");
    }

    #[test]
    fn test_find_all_is_ordered_and_scoped() {
        let repo = repository();
        repo.save(Config::new("b", "2")).unwrap();
        repo.save(Config::new("a", "1")).unwrap();
        repo.backend().set(b"other:key".to_vec(), b"{}".to_vec()).unwrap();

        let keys: Vec<String> = repo.find_all().unwrap().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_delete_by_id() {
        let repo = repository();
        repo.save(Config::new("a", "1")).unwrap();

        repo.delete_by_id("a").unwrap();
        assert_eq!(repo.count().unwrap(), 0);
        let missing = repo.delete_by_id("a");
        assert!(matches!(missing, Err(StorageError::NotFound { key }) if key == "a"));
    }

    #[test]
    fn test_declared_capabilities() {
        assert_eq!(
            StorageConfigRepository::<MemoryBackend>::declared_capabilities(),
            ["ConfigRepository", "Repository"]
        );
    }
}
