//! Durable local mirror of the cart.
//!
//! The cache is one JSON array of [`LocalCacheEntry`] under a single key.
//! It is never authoritative while the remote is reachable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pethub_core::LocalCacheEntry;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File name of the cache key.
pub const CACHE_KEY: &str = "petHubCart";

/// Errors from reading or writing the local cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage for the local cart mirror.
#[async_trait]
pub trait LocalCartStore: Send + Sync {
    /// Current cached entries; empty when nothing is cached.
    async fn snapshot(&self) -> Result<Vec<LocalCacheEntry>, CacheError>;

    /// Replace the cached entries.
    async fn persist(&self, entries: &[LocalCacheEntry]) -> Result<(), CacheError>;

    /// Drop the cache.
    async fn clear(&self) -> Result<(), CacheError>;
}

// =============================================================================
// File store
// =============================================================================

/// Cache stored as `<dir>/petHubCart.json`.
///
/// Writes go to a temp file that is renamed over the target, so a reader
/// never sees a half-written array.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CACHE_KEY}.json")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl LocalCartStore for FileCartStore {
    async fn snapshot(&self) -> Result<Vec<LocalCacheEntry>, CacheError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Local cart cache is corrupt, ignoring it");
                Ok(Vec::new())
            }
        }
    }

    async fn persist(&self, entries: &[LocalCacheEntry]) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec(entries)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), entries = entries.len(), "Local cart cache written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-process cache, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    entries: Mutex<Vec<LocalCacheEntry>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries(entries: Vec<LocalCacheEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl LocalCartStore for MemoryCartStore {
    async fn snapshot(&self) -> Result<Vec<LocalCacheEntry>, CacheError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn persist(&self, entries: &[LocalCacheEntry]) -> Result<(), CacheError> {
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pethub_core::{Price, ProductId};

    use super::*;

    fn entry(product: &str, quantity: u32) -> LocalCacheEntry {
        LocalCacheEntry {
            product_id: ProductId::new(product),
            size: "M".to_string(),
            price: Price::from_whole(100),
            quantity,
            name: "Kibble".to_string(),
            description: String::new(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persist_then_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path().join("nested"));
        let entries = vec![entry("p1", 2), entry("p2", 1)];

        store.persist(&entries).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap(), entries);
        assert!(store.path().ends_with("petHubCart.json"));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());
        store.persist(&[entry("p1", 2)]).await.unwrap();
        store.persist(&[entry("p2", 5)]).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap(), vec![entry("p2", 5)]);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());
        tokio::fs::write(store.path(), b"{not json").await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCartStore::new(dir.path());
        store.persist(&[entry("p1", 1)]).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCartStore::with_entries(vec![entry("p1", 1)]);
        assert_eq!(store.snapshot().await.unwrap().len(), 1);
        store.clear().await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
    }
}
