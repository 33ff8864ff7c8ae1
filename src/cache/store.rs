//! Cache storage backends.
//!
//! [`CacheStore`] is the pluggable persistence seam under
//! [`ResponseCache`](super::ResponseCache). The store is a plain key-value
//! map of [`CacheEntry`] rows; TTL is interpreted by the cache layer, the
//! store only removes expired rows when asked to sweep.
//!
//! Two backends ship:
//!
//! - [`MemoryStore`] — moka LRU, per-process, zero setup. Good for tests
//!   and callers that don't need restart survival.
//! - [`FileStore`] — JSON map persisted with write-temp-then-rename, so
//!   entries survive process restarts and a crash mid-write leaves the
//!   previous file intact.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::warn;

use super::CacheEntry;
use crate::{FerrymanError, Result};

/// Key-value persistence for cache entries.
///
/// Implementations must be safe under concurrent readers and writers; each
/// operation is atomic from the caller's point of view.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, entry: CacheEntry) -> Result<()>;
    /// Physically remove rows expired as of `now_millis`, returning the
    /// count removed.
    async fn sweep(&self, now_millis: u64) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
}

/// In-memory backend over moka's async LRU cache.
pub struct MemoryStore {
    cache: Cache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.cache.insert(entry.cache_key.clone(), entry).await;
        Ok(())
    }

    async fn sweep(&self, now_millis: u64) -> Result<usize> {
        let expired: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_millis))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        for key in &expired {
            self.cache.invalidate(key).await;
        }
        Ok(expired.len())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }
}

/// Persistent backend: one JSON file holding the full entry map.
///
/// Every mutation rewrites the file through a temp-file rename, so readers
/// of the path never observe a half-written map. Suits the expected scale
/// (thousands of batch results); callers needing more should implement
/// [`CacheStore`] over a real embedded store.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl FileStore {
    /// Open a store at `path`, loading any existing entries.
    ///
    /// A missing file starts empty; an unreadable or corrupt file is logged
    /// and discarded on the next write — the cache is disposable data.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt cache file; starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(FerrymanError::CacheIo(e.to_string())),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Default on-disk location: `<user cache dir>/ferryman/response-cache.json`.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ferryman")
            .join("response-cache.json")
    }

    async fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FerrymanError::CacheIo(e.to_string()))?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| FerrymanError::CacheIo(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| FerrymanError::CacheIo(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.cache_key.clone(), entry);
        self.persist(&entries).await
    }

    async fn sweep(&self, now_millis: u64) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_millis));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries).await?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
