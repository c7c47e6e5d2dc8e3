//! Per-query and per-client options.

use std::time::Duration;

/// Client-wide defaults.
#[derive(Clone, Debug)]
pub struct QueryClientConfig {
    /// How long fetched data counts as fresh. Zero refetches on every
    /// observation.
    pub stale_time: Duration,
    /// How long an entry without subscribers is kept before collection.
    pub gc_time: Duration,
}

impl Default for QueryClientConfig {
    fn default() -> Self {
        QueryClientConfig {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(5 * 60),
        }
    }
}

/// Options for one query binding.
///
/// # Example
///
/// ```
/// use query_kit::query::QueryOptions;
/// use std::time::Duration;
///
/// let options: QueryOptions<u32> = QueryOptions::default()
///     .stale_time(Duration::from_secs(30))
///     .enabled(true);
/// assert!(options.enabled);
/// ```
#[derive(Clone, Debug)]
pub struct QueryOptions<T> {
    /// Disabled queries never call their fetcher and stay `Idle`.
    pub enabled: bool,
    /// Overrides [`QueryClientConfig::stale_time`].
    pub stale_time: Option<Duration>,
    /// Seeds an empty entry as a successful result without fetching.
    pub initial_data: Option<T>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        QueryOptions {
            enabled: true,
            stale_time: None,
            initial_data: None,
        }
    }
}

impl<T> QueryOptions<T> {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn initial_data(mut self, data: Option<T>) -> Self {
        self.initial_data = data;
        self
    }
}
