//! Persistent, TTL-expiring response cache keyed by batch content.
//!
//! Skips remote calls for batches the pipeline has already paid for. Two
//! hashes are computed per batch:
//!
//! - **cache key** — order-independent: items are whitespace-normalized and
//!   sorted before hashing, so two batches holding the same multiset of
//!   items hit the same entry regardless of arrival order. This is the
//!   lookup key.
//! - **fingerprint** — order-preserving hash of the exact item sequence,
//!   stored alongside the payload for exact-replay lookups. Not consulted
//!   on the default lookup path.
//!
//! Keys use a stable FNV-1a content hash rather than `DefaultHasher`:
//! SipHash keys are randomized per process, which would orphan every entry
//! in a persistent store on restart.
//!
//! Entries carry explicit `expires_at` timestamps and are logically absent
//! once expired even while physically present; [`ResponseCache::sweep`]
//! does the physical removal. Storage is pluggable via [`CacheStore`].

mod store;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::telemetry;

pub use store::{CacheStore, FileStore, MemoryStore};

/// Configuration for the response cache.
///
/// ```rust
/// # use ferryman::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(50_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries held by the in-memory backend. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 24 hours.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries (in-memory backend).
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// One persisted cache row. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub fingerprint: String,
    /// JSON-serialized result list (UTF-8 text-safe).
    pub payload: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl CacheEntry {
    /// An entry is expired strictly after its `expires_at` instant.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis > self.expires_at
    }
}

/// Content-addressed response cache over a pluggable store.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ResponseCache {
    /// Cache over the in-memory moka backend.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new(config.max_entries)),
            ttl: config.ttl,
        }
    }

    /// Cache over a caller-supplied backend (e.g. [`FileStore`]).
    pub fn with_store(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.ttl,
        }
    }

    /// Look up cached results for a batch under `operation`.
    ///
    /// Order-independent: any permutation of a previously stored item
    /// multiset hits. Expired entries miss even before a sweep. Emits cache
    /// hit/miss metrics.
    pub async fn get<R: DeserializeOwned>(
        &self,
        operation: &str,
        items: &[String],
    ) -> Result<Option<Vec<R>>> {
        let key = cache_key(operation, items);
        match self.store.get(&key).await? {
            Some(entry) if !entry.is_expired(epoch_millis()) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation.to_owned())
                    .increment(1);
                Ok(Some(serde_json::from_str(&entry.payload)?))
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation.to_owned())
                    .increment(1);
                Ok(None)
            }
        }
    }

    /// Store results for a batch under `operation`.
    pub async fn put<R: Serialize>(
        &self,
        operation: &str,
        items: &[String],
        results: &[R],
    ) -> Result<()> {
        let now = epoch_millis();
        let entry = CacheEntry {
            cache_key: cache_key(operation, items),
            fingerprint: fingerprint(items),
            payload: serde_json::to_string(results)?,
            created_at: now,
            expires_at: now + self.ttl.as_millis() as u64,
        };
        self.store.put(entry).await
    }

    /// Physically remove expired rows, returning the count removed.
    pub async fn sweep(&self) -> Result<usize> {
        self.store.sweep(epoch_millis()).await
    }

    /// Remove all rows.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Number of physically present rows (including expired, unswept ones).
    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }
}

/// Milliseconds since the Unix epoch.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Order-independent lookup key: hash of `(operation, sorted normalized items)`.
pub fn cache_key(operation: &str, items: &[String]) -> String {
    let mut normalized: Vec<&str> = items.iter().map(|i| i.trim()).collect();
    normalized.sort_unstable();
    format!("{}:{:016x}", operation, hash_items(&normalized))
}

/// Order-preserving fingerprint of the exact item sequence.
pub fn fingerprint(items: &[String]) -> String {
    let exact: Vec<&str> = items.iter().map(String::as_str).collect();
    format!("{:016x}", hash_items(&exact))
}

/// FNV-1a over length-prefixed items. Stable across processes, which the
/// persistent backend requires.
fn hash_items(items: &[&str]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };
    for item in items {
        // Length prefix keeps ["ab","c"] distinct from ["a","bc"].
        feed(&(item.len() as u64).to_le_bytes());
        feed(item.as_bytes());
    }
    hash
}
