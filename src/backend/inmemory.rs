//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding. Expired entries
//! are kept so the stale-while-revalidate layer can keep serving them.

use super::{CacheBackend, StoredEntry};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe async in-memory cache backend.
///
/// # Example
///
/// ```no_run
/// use query_kit::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     backend.set("posts:10", b"payload".to_vec(), Some(Duration::from_secs(300))).await?;
///     assert!(backend.get("posts:10").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get memory statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total_entries: 0,
            expired_entries: 0,
            total_bytes: 0,
        };
        for entry in self.store.iter() {
            stats.total_entries += 1;
            stats.total_bytes += entry.data.len();
            if entry.is_expired() {
                stats.expired_entries += 1;
            }
        }
        stats
    }

    /// Write cache statistics to the log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            "Cache Stats: {} entries ({} stale), {} bytes",
            stats.total_entries, stats.expired_entries, stats.total_bytes
        );
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        match self.store.get(key) {
            Some(entry) => {
                debug!(
                    "✓ InMemory GET {} -> {}",
                    key,
                    if entry.is_expired() { "STALE" } else { "HIT" }
                );
                Ok(Some(entry.clone()))
            }
            None => {
                debug!("✓ InMemory GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store
            .insert(key.to_string(), StoredEntry::new(value, ttl));

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
