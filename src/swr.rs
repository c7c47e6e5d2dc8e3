//! Server-side response cache with stale-while-revalidate semantics.
//!
//! Read path for a key:
//!
//! 1. **Fresh** entry: return it.
//! 2. **Stale** entry: return it immediately and claim the key's single
//!    background refresh. Readers arriving while the refresh runs
//!    (**Revalidating**) get the same stale payload and never wait.
//! 3. **Missing** entry: load from upstream. Concurrent cold readers of the
//!    same key share one upstream call.
//!
//! A failed refresh is logged and dropped; the stale payload keeps being
//! served and the next reader claims a new refresh.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::freshness::Freshness;
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type SharedLoad = Shared<BoxFuture<'static, Result<Vec<u8>>>>;

/// Stale-while-revalidate cache over a [`CacheBackend`].
///
/// Cloning is cheap and every clone shares storage and in-flight state.
///
/// # Example
///
/// ```ignore
/// use query_kit::swr::SwrCache;
/// use query_kit::backend::InMemoryBackend;
/// use query_kit::observability::TtlPolicy;
/// use std::time::Duration;
///
/// let cache = SwrCache::new(InMemoryBackend::new())
///     .with_ttl_policy(TtlPolicy::Fixed(Duration::from_secs(300)));
///
/// let posts: Vec<Post> = cache
///     .get_or_load("posts:10", move || { let repo = repo.clone(); async move { repo.list(10).await } })
///     .await?;
/// ```
#[derive(Clone)]
pub struct SwrCache<B: CacheBackend> {
    backend: B,
    metrics: Arc<dyn CacheMetrics>,
    ttl_policy: TtlPolicy,
    revalidating: Arc<DashSet<String>>,
    loading: Arc<DashMap<String, SharedLoad>>,
}

impl<B: CacheBackend> SwrCache<B> {
    pub fn new(backend: B) -> Self {
        SwrCache {
            backend,
            metrics: Arc::new(NoOpMetrics),
            ttl_policy: TtlPolicy::default(),
            revalidating: Arc::new(DashSet::new()),
            loading: Arc::new(DashMap::new()),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set custom TTL policy.
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Freshness window applied to `key`, if any.
    pub fn ttl_for(&self, key: &str) -> Option<Duration> {
        let prefix = key.split(':').next().unwrap_or(key);
        self.ttl_policy.get_ttl(prefix)
    }

    /// Read `key`, loading or refreshing it through `loader` as needed.
    ///
    /// `loader` is kept for a possible background refresh, so it must be
    /// `'static` and callable more than once.
    ///
    /// # Errors
    ///
    /// - Any error `loader` returns on a cold miss (nothing stale to serve)
    /// - `Error::SerializationError`: the loaded value cannot be stored
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let timer = Instant::now();

        if let Some(entry) = self.backend.get(key).await? {
            match deserialize_from_cache::<T>(&entry.data) {
                Ok(value) => {
                    let freshness = Freshness::of(&entry, self.revalidating.contains(key));
                    debug!("» SWR read {} ({})", key, freshness);

                    if freshness == Freshness::Fresh {
                        self.metrics.record_hit(key, timer.elapsed());
                    } else {
                        self.metrics.record_stale(key, entry.age());
                        if freshness.needs_refresh() {
                            self.spawn_revalidation(key, loader);
                        }
                    }
                    return Ok(value);
                }
                Err(e) if e.is_corrupt_entry() => {
                    warn!("Dropping unreadable cache entry {}: {}", key, e);
                    self.backend.delete(key).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let bytes = match self.load_coalesced(key, loader).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        };
        self.metrics.record_miss(key, timer.elapsed());
        deserialize_from_cache(&bytes)
    }

    /// Drop `key` so the next read goes upstream.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }

    /// Whether a background refresh is currently claimed for `key`.
    pub fn is_revalidating(&self, key: &str) -> bool {
        self.revalidating.contains(key)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Claim the key's refresh slot; losers return without doing anything.
    fn spawn_revalidation<T, F, Fut>(&self, key: &str, loader: F)
    where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !self.revalidating.insert(key.to_string()) {
            return;
        }

        let this = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let timer = Instant::now();
            match this.load_guarded(&key, &loader).await {
                Ok(_) => this.metrics.record_revalidate(&key, timer.elapsed()),
                Err(e) => {
                    warn!("Revalidation of {} failed, serving stale: {}", key, e);
                    this.metrics.record_error(&key, &e.to_string());
                }
            }
            this.revalidating.remove(&key);
        });
    }

    /// Load `key` once for every concurrent cold reader.
    async fn load_coalesced<T, F, Fut>(&self, key: &str, loader: F) -> Result<Vec<u8>>
    where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = match self.loading.entry(key.to_string()) {
            Entry::Occupied(in_flight) => {
                debug!("Joining in-flight load for {}", key);
                in_flight.get().clone()
            }
            Entry::Vacant(slot) => {
                let this = self.clone();
                let owned_key = key.to_string();
                // spawned so a disconnecting client does not cancel the load
                let handle = tokio::spawn(async move {
                    let result = this.load_guarded(&owned_key, &loader).await;
                    this.loading.remove(&owned_key);
                    result
                });
                let load = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(Error::Other(format!("load task failed: {}", e))),
                    }
                }
                .boxed()
                .shared();
                slot.insert(load.clone());
                load
            }
        };
        shared.await
    }

    /// [`Self::load_and_store`] with a panicking loader turned into an error,
    /// so the caller always gets to release its slot.
    async fn load_guarded<T, F, Fut>(&self, key: &str, loader: &F) -> Result<Vec<u8>>
    where
        T: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        AssertUnwindSafe(self.load_and_store(key, loader))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::from_panic(panic)))
    }

    async fn load_and_store<T, F, Fut>(&self, key: &str, loader: &F) -> Result<Vec<u8>>
    where
        T: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = loader().await?;
        let bytes = serialize_for_cache(&value)?;
        self.backend
            .set(key, bytes.clone(), self.ttl_for(key))
            .await?;
        info!("✓ Stored {} ({} bytes)", key, bytes.len());
        Ok(bytes)
    }
}
