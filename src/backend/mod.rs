//! Storage backends for the server-side response cache.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub mod inmemory;

pub use inmemory::InMemoryBackend;

/// A stored payload together with its freshness window.
///
/// Backends hand back expired entries too: the stale-while-revalidate layer
/// decides whether an entry is served, refreshed, or both.
#[derive(Clone, Debug)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub stored_at: Instant,
    pub expires_at: Option<Instant>,
}

impl StoredEntry {
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let stored_at = Instant::now();
        StoredEntry {
            data,
            stored_at,
            expires_at: ttl.map(|d| stored_at + d),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    /// Time since the payload was written.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }
}

/// Trait for cache backend implementations.
///
/// **IMPORTANT:** All methods use `&self`; implementations use interior
/// mutability. Returned futures are `Send` because revalidation writes happen
/// on spawned tasks.
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Retrieve an entry by key, expired or not.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<StoredEntry>>> + Send;

    /// Store a payload with optional TTL. `None` never expires.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove an entry.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Drop every entry.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stored_entry_expiry() {
        let entry = StoredEntry::new(vec![1], Some(Duration::from_secs(300)));
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.age(), Duration::from_secs(300));
    }

    #[test]
    fn test_stored_entry_without_ttl() {
        let entry = StoredEntry::new(vec![1], None);
        assert!(!entry.is_expired());
    }
}
