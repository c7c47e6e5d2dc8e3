//! Observable state of queries and mutations.

use crate::error::Error;
use tokio::time::Instant;

/// Lifecycle of a query: `Idle → Loading → (Success | Error)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Never fetched (or disabled).
    #[default]
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    Success,
    /// Last fetch failed. Earlier data, if any, is still in `data`.
    Error,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Idle => write!(f, "idle"),
            QueryStatus::Loading => write!(f, "loading"),
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of one cache entry, as delivered to subscribers.
#[derive(Clone, Debug)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<Error>,
    pub status: QueryStatus,
    /// A fetch (first load or background refetch) is running.
    pub is_fetching: bool,
    /// Marked stale by an invalidation and not refetched since.
    pub is_invalidated: bool,
    pub fetched_at: Option<Instant>,
    pub stale_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        QueryState {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_fetching: false,
            is_invalidated: false,
            fetched_at: None,
            stale_at: None,
        }
    }
}

impl<T> QueryState<T> {
    /// Whether the next observation should fetch.
    pub fn is_stale(&self) -> bool {
        self.is_invalidated || self.stale_at.map_or(true, |at| Instant::now() >= at)
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Lifecycle of a mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// Snapshot of a mutation's last run.
#[derive(Clone, Debug)]
pub struct MutationState<R> {
    pub status: MutationStatus,
    pub data: Option<R>,
    pub error: Option<Error>,
}

impl<R> Default for MutationState<R> {
    fn default() -> Self {
        MutationState {
            status: MutationStatus::Idle,
            data: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_state_is_idle_and_stale() {
        let state: QueryState<u32> = QueryState::default();
        assert_eq!(state.status, QueryStatus::Idle);
        assert!(state.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_window() {
        let state = QueryState {
            data: Some(1),
            status: QueryStatus::Success,
            fetched_at: Some(Instant::now()),
            stale_at: Some(Instant::now() + Duration::from_secs(60)),
            ..QueryState::default()
        };
        assert!(!state.is_stale());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(state.is_stale());
    }

    #[test]
    fn test_invalidated_is_stale() {
        let state = QueryState {
            data: Some(1),
            status: QueryStatus::Success,
            is_invalidated: true,
            stale_at: Some(Instant::now() + Duration::from_secs(3600)),
            ..QueryState::default()
        };
        assert!(state.is_stale());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QueryStatus::Loading.to_string(), "loading");
    }
}
