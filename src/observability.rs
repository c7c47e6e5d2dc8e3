//! Metrics hooks and TTL policies for the server-side response cache.
//!
//! # Metrics
//!
//! Implement [`CacheMetrics`] to forward cache events to a monitoring
//! system. Every method has a default body that logs through the `log`
//! facade, so an empty impl is a logging sink:
//!
//! ```
//! use query_kit::observability::CacheMetrics;
//!
//! struct AuditMetrics;
//! impl CacheMetrics for AuditMetrics {}
//! ```
//!
//! [`NoOpMetrics`] discards everything and is the default.
//!
//! # TTL Policies
//!
//! ```
//! use query_kit::observability::TtlPolicy;
//! use std::time::Duration;
//!
//! // Five-minute freshness window for every key
//! let policy = TtlPolicy::Fixed(Duration::from_secs(300));
//! assert_eq!(policy.get_ttl("posts"), Some(Duration::from_secs(300)));
//! ```
//!
//! | Policy | Effect |
//! |--------|--------|
//! | `Default` | Entries never go stale |
//! | `Fixed` | Same window for every key |
//! | `PerType` | Window chosen by key prefix |

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Fresh entry served.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Expired entry served while a refresh runs.
    fn record_stale(&self, key: &str, age: Duration) {
        debug!("Cache STALE: {} age {:?}", key, age);
    }

    /// Nothing cached; the caller waited for upstream.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Background refresh finished and replaced the entry.
    fn record_revalidate(&self, key: &str, duration: Duration) {
        debug!("Cache REVALIDATE: {} took {:?}", key, duration);
    }

    /// Load or refresh failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_stale(&self, _key: &str, _age: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_revalidate(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics sink that only logs.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// TTL (freshness window) policy for server cache entries.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    #[default]
    Default,

    /// Fixed duration for all entries
    Fixed(Duration),

    /// Custom per-prefix policy
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// Get TTL for a key prefix (`"posts"` for `"posts:10"`).
    pub fn get_ttl(&self, prefix: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Default => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::PerType(f) => Some(f(prefix)),
        }
    }
}
