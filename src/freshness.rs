//! Per-key freshness state for the stale-while-revalidate cache.
//!
//! ```text
//!            ttl elapses             refresh claimed
//!   Fresh ──────────────▶ Stale ──────────────────▶ Revalidating
//!     ▲                                                  │
//!     └──────────────── refresh stored ──────────────────┘
//!                (refresh failed: back to Stale)
//! ```
//!
//! `Stale → Revalidating` is the only guarded transition: exactly one caller
//! wins it per key, every other caller keeps reading the stale payload.

use crate::backend::StoredEntry;

/// Freshness of a server cache entry as seen by one reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Within its TTL; served as-is.
    Fresh,
    /// Past its TTL and nobody is refreshing it yet.
    Stale,
    /// Past its TTL and a background refresh is in flight.
    Revalidating,
}

impl Freshness {
    /// Classify an entry given whether a refresh is currently claimed.
    pub fn of(entry: &StoredEntry, refresh_in_flight: bool) -> Self {
        match (entry.is_expired(), refresh_in_flight) {
            (false, _) => Freshness::Fresh,
            (true, false) => Freshness::Stale,
            (true, true) => Freshness::Revalidating,
        }
    }

    /// Whether a reader in this state should try to claim a refresh.
    pub fn needs_refresh(self) -> bool {
        self == Freshness::Stale
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Freshness::Fresh => write!(f, "Fresh"),
            Freshness::Stale => write!(f, "Stale"),
            Freshness::Revalidating => write!(f, "Revalidating"),
        }
    }
}
