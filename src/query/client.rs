//! The client-side query cache and its live query handles.

use super::entry::{AnyEntry, Fetcher, QueryEntry};
use super::options::{QueryClientConfig, QueryOptions};
use super::state::QueryState;
use crate::error::{Error, Result};
use crate::key::QueryKey;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Keyed cache of async results.
///
/// Entries are keyed by the canonical form of their [`QueryKey`]. Each entry
/// keeps its state in a `watch` channel whose receivers are the entry's
/// subscribers, and an in-flight slot so concurrent observers share one
/// fetch. Clones share the same cache.
///
/// # Example
///
/// ```
/// use query_kit::key::QueryKey;
/// use query_kit::query::{QueryClient, QueryOptions};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> query_kit::Result<()> {
/// let client = QueryClient::new();
/// let query = client.query(
///     QueryKey::new("answer"),
///     || async { Ok(42u32) },
///     QueryOptions::default(),
/// )?;
/// assert_eq!(query.observe().await.data, Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct QueryClient {
    entries: Arc<DashMap<String, Arc<dyn AnyEntry>>>,
    config: QueryClientConfig,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueryClientConfig) -> Self {
        QueryClient {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &QueryClientConfig {
        &self.config
    }

    /// Bind `key` to `fetcher` and return a live handle.
    ///
    /// The entry is created on first use. Binding does not fetch; call
    /// [`Query::observe`] for that. A disabled binding never registers its
    /// fetcher, so it cannot trigger a call.
    ///
    /// # Errors
    /// `Error::ValidationError` if `key` is already bound to another data type.
    pub fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions<T>,
    ) -> Result<Query<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let stale_time = options.stale_time.unwrap_or(self.config.stale_time);
        let (entry, receiver) = self.bind::<T>(key, stale_time)?;
        entry.set_stale_time(stale_time);

        if options.enabled {
            let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
            entry.set_fetcher(fetcher);
        }
        if let Some(initial) = options.initial_data {
            entry.seed(initial);
        }

        Ok(Query::new(entry, receiver, options.enabled))
    }

    /// Find or create the entry for `key` and subscribe to it.
    fn bind<T: Clone + Send + Sync + 'static>(
        &self,
        key: QueryKey,
        stale_time: Duration,
    ) -> Result<(Arc<QueryEntry<T>>, watch::Receiver<QueryState<T>>)> {
        let slot = self.entries.entry(key.canonical()).or_insert_with(|| {
            debug!("Creating query entry {}", key);
            let created: Arc<dyn AnyEntry> = QueryEntry::<T>::new(key.clone(), stale_time);
            created
        });

        // subscribe under the shard lock; collection cannot remove it in between
        let entry = slot.value().clone().as_any().downcast::<QueryEntry<T>>().map_err(|_| {
            Error::ValidationError(format!("query {} is bound to a different data type", key))
        })?;
        let receiver = entry.subscribe();
        drop(slot);
        Ok((entry, receiver))
    }

    /// Current data for `key`, if the entry exists and holds `T`.
    pub fn get_query_data<T: Clone + Send + Sync + 'static>(&self, key: &QueryKey) -> Option<T> {
        let erased = self.entries.get(&key.canonical())?.clone();
        let entry = erased.as_any().downcast::<QueryEntry<T>>().ok()?;
        entry.snapshot().data
    }

    /// Mark every entry under `prefix` stale and refetch the observed ones.
    ///
    /// Entries without subscribers only get the stale mark; they reload on
    /// their next observation. Returns the number of entries marked.
    pub async fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let (marked, refetches) = self.mark_stale(prefix);
        join_all(refetches).await;
        marked
    }

    /// Mark every entry under `prefix` stale right away and return the
    /// refetches of the observed ones, to be awaited or spawned.
    pub(crate) fn mark_stale(&self, prefix: &QueryKey) -> (usize, Vec<BoxFuture<'static, ()>>) {
        let matched: Vec<Arc<dyn AnyEntry>> = self
            .entries
            .iter()
            .filter(|e| e.value().key().starts_with(prefix))
            .map(|e| e.value().clone())
            .collect();

        for entry in &matched {
            entry.invalidate();
        }
        info!("Invalidated {} queries under {}", matched.len(), prefix);

        let refetches = matched
            .iter()
            .filter(|e| e.is_observed() && e.can_fetch())
            .map(|e| e.clone().refetch())
            .collect();
        (matched.len(), refetches)
    }

    /// Remove entries unobserved for longer than `gc_time`.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.config.gc_time;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_collectable(gc_time));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Collected {} unobserved queries", removed);
        }
        removed
    }

    /// Run [`QueryClient::collect_garbage`] every `interval`.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                client.collect_garbage();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        warn!("Clearing {} queries", self.entries.len());
        self.entries.clear();
    }
}

/// Live handle on one cache entry.
///
/// Holding a handle subscribes to the entry; the entry becomes eligible for
/// collection once every handle is dropped.
pub struct Query<T: Clone + Send + Sync + 'static> {
    entry: Arc<QueryEntry<T>>,
    receiver: watch::Receiver<QueryState<T>>,
    enabled: bool,
}

impl<T: Clone + Send + Sync + 'static> Query<T> {
    fn new(
        entry: Arc<QueryEntry<T>>,
        receiver: watch::Receiver<QueryState<T>>,
        enabled: bool,
    ) -> Self {
        Query {
            entry,
            receiver,
            enabled,
        }
    }

    pub fn key(&self) -> &QueryKey {
        self.entry.key()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.receiver.borrow().data.clone()
    }

    /// Fetch if the entry is missing or stale, then return its state.
    ///
    /// Simultaneous observers share one fetch. Fetch errors end up in the
    /// returned state, alongside any earlier data.
    pub async fn observe(&self) -> QueryState<T> {
        if self.enabled && self.entry.is_stale() {
            // recorded in the entry state
            let _ = self.entry.fetch().await;
        }
        self.state()
    }

    /// Fetch regardless of freshness. No-op on a disabled query.
    pub async fn refetch(&self) -> QueryState<T> {
        if self.enabled {
            let _ = self.entry.fetch().await;
        }
        self.state()
    }

    /// Wait for the next state change.
    ///
    /// # Errors
    /// `Error::Other` if the entry was dropped from the cache.
    pub async fn changed(&mut self) -> Result<QueryState<T>> {
        self.receiver
            .changed()
            .await
            .map_err(|_| Error::Other(format!("query {} was removed", self.entry.key())))?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Another subscriber on the same entry.
    pub fn subscribe(&self) -> Query<T> {
        Query::new(self.entry.clone(), self.entry.subscribe(), self.enabled)
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for Query<T> {
    fn clone(&self) -> Self {
        self.subscribe()
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Query<T> {
    fn drop(&mut self) {
        self.entry.release();
    }
}
