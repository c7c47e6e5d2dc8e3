//! Mutations and their invalidation edges.

use super::client::QueryClient;
use super::state::{MutationState, MutationStatus};
use crate::error::Result;
use crate::key::QueryKey;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

type MutateFn<V, R> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<R>> + Send + Sync>;
type Edges<V, R> = Arc<dyn Fn(&V, &R) -> Vec<QueryKey> + Send + Sync>;

/// A write operation bound to the query cache.
///
/// On success every key prefix returned by the invalidation edges is marked
/// stale before `mutate` resolves. Observed queries refetch in the
/// background; the next observation joins that refetch instead of serving
/// the old data.
///
/// # Example
///
/// ```
/// use query_kit::key::QueryKey;
/// use query_kit::query::{Mutation, QueryClient};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> query_kit::Result<()> {
/// let client = QueryClient::new();
/// let add = Mutation::new(client, |n: u32| async move { Ok(n + 1) })
///     .invalidates(|_, _| vec![QueryKey::new("numbers")]);
/// assert_eq!(add.mutate(1).await?, 2);
/// # Ok(())
/// # }
/// ```
pub struct Mutation<V, R> {
    client: QueryClient,
    mutate_fn: MutateFn<V, R>,
    edges: Edges<V, R>,
    state: watch::Sender<MutationState<R>>,
}

impl<V, R> Mutation<V, R>
where
    V: Clone + Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(client: QueryClient, mutate_fn: F) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let (state, _) = watch::channel(MutationState::default());
        Mutation {
            client,
            mutate_fn: Arc::new(move |vars| mutate_fn(vars).boxed()),
            edges: Arc::new(|_, _| Vec::new()),
            state,
        }
    }

    /// Key prefixes to invalidate after a successful run.
    pub fn invalidates<E>(mut self, edges: E) -> Self
    where
        E: Fn(&V, &R) -> Vec<QueryKey> + Send + Sync + 'static,
    {
        self.edges = Arc::new(edges);
        self
    }

    /// Run the mutation.
    ///
    /// # Errors
    /// Whatever the mutation function returns; nothing is invalidated then.
    pub async fn mutate(&self, vars: V) -> Result<R> {
        self.state.send_modify(|s| {
            s.status = MutationStatus::Pending;
            s.error = None;
        });

        match (self.mutate_fn)(vars.clone()).await {
            Ok(result) => {
                self.state.send_modify(|s| {
                    s.status = MutationStatus::Success;
                    s.data = Some(result.clone());
                });

                let mut refetches = Vec::new();
                for prefix in (self.edges)(&vars, &result) {
                    refetches.extend(self.client.mark_stale(&prefix).1);
                }
                // detached: the result never waits on a refetch
                if !refetches.is_empty() {
                    tokio::spawn(join_all(refetches));
                }
                Ok(result)
            }
            Err(e) => {
                warn!("Mutation failed: {}", e);
                self.state.send_modify(|s| {
                    s.status = MutationStatus::Error;
                    s.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    pub fn state(&self) -> MutationState<R> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState<R>> {
        self.state.subscribe()
    }

    /// Back to `Idle`, forgetting the last result.
    pub fn reset(&self) {
        self.state.send_replace(MutationState::default());
    }
}
