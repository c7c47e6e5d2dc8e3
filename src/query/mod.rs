//! Client-side query cache.
//!
//! A [`QueryClient`] maps canonical [`QueryKey`](crate::key::QueryKey)s to
//! entries. [`QueryClient::query`] binds a key to a fetcher and hands back a
//! [`Query`] handle; observing the handle fetches when the entry is missing
//! or stale, with at most one fetch in flight per key. A [`Mutation`] runs a
//! write and invalidates key prefixes on success, which refetches every
//! observed query under those prefixes.

mod client;
mod entry;
mod mutation;
mod options;
mod state;

pub use client::{Query, QueryClient};
pub use mutation::Mutation;
pub use options::{QueryClientConfig, QueryOptions};
pub use state::{MutationState, MutationStatus, QueryState, QueryStatus};
