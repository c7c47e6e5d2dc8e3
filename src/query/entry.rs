//! One keyed cache entry: state, subscribers, fetcher and in-flight slot.

use super::state::{QueryState, QueryStatus};
use crate::error::{Error, Result};
use crate::key::QueryKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub(crate) type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;
type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Type-erased view used by the client for invalidation and collection.
pub(crate) trait AnyEntry: Send + Sync {
    fn key(&self) -> &QueryKey;

    /// Mark stale; the next observation (or an immediate refetch) reloads.
    fn invalidate(&self);

    /// At least one live `Query` handle subscribes to this entry.
    fn is_observed(&self) -> bool;

    /// A fetcher is registered (the entry has seen an enabled query).
    fn can_fetch(&self) -> bool;

    fn refetch(self: Arc<Self>) -> BoxFuture<'static, ()>;

    /// No subscriber and nothing in flight for at least `gc_time`.
    fn is_collectable(&self, gc_time: Duration) -> bool;

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub(crate) struct QueryEntry<T> {
    key: QueryKey,
    state: watch::Sender<QueryState<T>>,
    fetcher: Mutex<Option<Fetcher<T>>>,
    stale_time: Mutex<Duration>,
    /// Bumped by every invalidation; a fetch started under an older
    /// generation does not clear the invalidated flag.
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, SharedFetch<T>)>>,
    unobserved_since: Mutex<Option<Instant>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone + Send + Sync + 'static> QueryEntry<T> {
    pub(crate) fn new(key: QueryKey, stale_time: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(QueryState::default());
        Arc::new(QueryEntry {
            key,
            state,
            fetcher: Mutex::new(None),
            stale_time: Mutex::new(stale_time),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            unobserved_since: Mutex::new(Some(Instant::now())),
        })
    }

    pub(crate) fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest registration wins.
    pub(crate) fn set_fetcher(&self, fetcher: Fetcher<T>) {
        *lock(&self.fetcher) = Some(fetcher);
    }

    pub(crate) fn set_stale_time(&self, stale_time: Duration) {
        *lock(&self.stale_time) = stale_time;
    }

    /// Store `data` as a successful result if the entry holds nothing yet.
    pub(crate) fn seed(&self, data: T) {
        let stale_time = *lock(&self.stale_time);
        self.state.send_if_modified(|s| {
            if s.data.is_some() || s.status != QueryStatus::Idle {
                return false;
            }
            let now = Instant::now();
            s.data = Some(data);
            s.status = QueryStatus::Success;
            s.fetched_at = Some(now);
            s.stale_at = Some(now + stale_time);
            true
        });
    }

    pub(crate) fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.state.borrow().is_stale()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        *lock(&self.unobserved_since) = None;
        self.state.subscribe()
    }

    /// Called by a handle about to drop its receiver.
    pub(crate) fn release(&self) {
        if self.state.receiver_count() <= 1 {
            *lock(&self.unobserved_since) = Some(Instant::now());
        }
    }

    /// Fetch through the registered fetcher, joining any fetch in flight.
    ///
    /// A fetch that started before the latest invalidation is awaited and
    /// then followed by a new one, so the caller always sees data loaded
    /// after the invalidation while there is never more than one fetch in
    /// flight.
    pub(crate) async fn fetch(self: &Arc<Self>) -> Result<T> {
        loop {
            let generation = self.generation.load(Ordering::SeqCst);
            let (started_under, pending) = self.join_or_start(generation)?;
            let result = pending.await;
            if started_under >= generation {
                return result;
            }
            debug!("Fetch for {} predates invalidation, fetching again", self.key);
        }
    }

    fn join_or_start(self: &Arc<Self>, generation: u64) -> Result<(u64, SharedFetch<T>)> {
        let mut slot = lock(&self.in_flight);
        if let Some((started_under, pending)) = slot.as_ref() {
            debug!("Joining in-flight fetch for {}", self.key);
            return Ok((*started_under, pending.clone()));
        }

        let fetcher = lock(&self.fetcher).clone().ok_or_else(|| {
            Error::ValidationError(format!("no fetcher registered for query {}", self.key))
        })?;

        self.state.send_modify(|s| {
            s.is_fetching = true;
            if s.data.is_none() {
                s.status = QueryStatus::Loading;
            }
        });

        let entry = Arc::clone(self);
        // spawned: dropping every observer does not cancel the request
        let handle = tokio::spawn(async move {
            // a panicking fetcher still settles the entry
            let result = AssertUnwindSafe(async move { fetcher().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(Error::from_panic(panic)));
            entry.settle(&result, generation);
            result
        });
        let pending = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        *slot = Some((generation, pending.clone()));
        Ok((generation, pending))
    }

    fn settle(&self, result: &Result<T>, generation: u64) {
        *lock(&self.in_flight) = None;
        let stale_time = *lock(&self.stale_time);
        let current = self.generation.load(Ordering::SeqCst) == generation;

        self.state.send_modify(|s| {
            s.is_fetching = false;
            match result {
                Ok(data) => {
                    let now = Instant::now();
                    s.data = Some(data.clone());
                    s.error = None;
                    s.status = QueryStatus::Success;
                    s.fetched_at = Some(now);
                    s.stale_at = Some(now + stale_time);
                    if current {
                        s.is_invalidated = false;
                    }
                }
                Err(e) => {
                    // prior data stays in place
                    s.error = Some(e.clone());
                    s.status = QueryStatus::Error;
                }
            }
        });

        match result {
            Ok(_) => info!("✓ Query {} fetched", self.key),
            Err(e) => warn!("Query {} failed: {}", self.key, e),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> AnyEntry for QueryEntry<T> {
    fn key(&self) -> &QueryKey {
        &self.key
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|s| s.is_invalidated = true);
        debug!("Invalidated {}", self.key);
    }

    fn is_observed(&self) -> bool {
        self.state.receiver_count() > 0
    }

    fn can_fetch(&self) -> bool {
        lock(&self.fetcher).is_some()
    }

    fn refetch(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            // the error is recorded in the entry state
            let _ = self.fetch().await;
        }
        .boxed()
    }

    fn is_collectable(&self, gc_time: Duration) -> bool {
        if self.is_observed() || lock(&self.in_flight).is_some() {
            return false;
        }
        lock(&self.unobserved_since).is_some_and(|since| since.elapsed() >= gc_time)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
