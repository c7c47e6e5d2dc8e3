//! # query-kit
//!
//! Layered data fetching for a posts API.
//!
//! ## Layers
//!
//! - **Remote client** ([`client::PostsClient`]): stateless HTTP calls to
//!   the posts API behind the [`repository::PostsRepository`] seam.
//! - **Server response cache** ([`swr::SwrCache`], served by [`routes`]):
//!   stale-while-revalidate over `GET /api/posts`, one upstream call per key
//!   no matter how many requests arrive.
//! - **Query cache** ([`query::QueryClient`]): keyed async results with
//!   subscriber handles, request coalescing and prefix invalidation.
//! - **Bindings** ([`posts::PostsQueries`]): list / get / create / update /
//!   delete wired to their keys and invalidation edges.
//! - **Stores** ([`stores`]): notifications, counter, session and UI state,
//!   owned by [`context::AppContext`].
//!
//! ## Quick Start
//!
//! ```
//! use query_kit::posts::PostsQueries;
//! use query_kit::query::QueryClient;
//! use query_kit::repository::InMemoryPostsRepository;
//! use query_kit::entity::NewPost;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> query_kit::Result<()> {
//! let posts = PostsQueries::new(
//!     QueryClient::new(),
//!     Arc::new(InMemoryPostsRepository::seeded(20)),
//! );
//!
//! let list = posts.list(10, None)?;
//! assert_eq!(list.observe().await.data.map(|p| p.len()), Some(10));
//!
//! // marks every ["posts", ...] query stale; observed ones refetch in the background
//! posts.create().mutate(NewPost::new("hello", "world")).await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod client;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod freshness;
pub mod key;
pub mod observability;
pub mod posts;
pub mod query;
pub mod repository;
pub mod routes;
pub mod serialization;
pub mod stores;
pub mod swr;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use context::AppContext;
pub use entity::{NewPost, Post, PostUpdate};
pub use error::{Error, Result};
pub use key::QueryKey;
pub use posts::PostsQueries;
pub use query::{Query, QueryClient};
pub use repository::PostsRepository;
pub use swr::SwrCache;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
