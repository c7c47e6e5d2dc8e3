//! HTTP surface of the server-side response cache.

use crate::backend::InMemoryBackend;
use crate::entity::Post;
use crate::error::Error;
use crate::key::{normalize_limit, CacheKeyBuilder};
use crate::repository::PostsRepository;
use crate::swr::SwrCache;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state of the posts routes.
pub struct ServerState<R> {
    pub cache: SwrCache<InMemoryBackend>,
    pub repo: Arc<R>,
    pub max_age: Duration,
}

impl<R> Clone for ServerState<R> {
    fn clone(&self) -> Self {
        ServerState {
            cache: self.cache.clone(),
            repo: self.repo.clone(),
            max_age: self.max_age,
        }
    }
}

impl<R: PostsRepository> ServerState<R> {
    pub fn new(cache: SwrCache<InMemoryBackend>, repo: Arc<R>, max_age: Duration) -> Self {
        ServerState {
            cache,
            repo,
            max_age,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Kept raw so malformed values fall back to the default limit.
    limit: Option<String>,
}

/// `GET /api/posts` and `GET /healthz`.
pub fn router<R: PostsRepository>(state: ServerState<R>) -> Router {
    Router::new()
        .route("/api/posts", get(list_posts::<R>))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn list_posts<R: PostsRepository>(
    State(state): State<ServerState<R>>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = normalize_limit(params.limit.as_deref());
    let key = CacheKeyBuilder::list::<Post>(limit);
    let repo = state.repo.clone();

    let result = state
        .cache
        .get_or_load(&key, move || {
            let repo = repo.clone();
            async move { repo.list(limit).await }
        })
        .await;

    match result {
        Ok(posts) => {
            let posts: Vec<Post> = posts;
            let mut response = Json(posts).into_response();
            let cache_control = format!(
                "s-maxage={}, stale-while-revalidate",
                state.max_age.as_secs()
            );
            if let Ok(value) = HeaderValue::from_str(&cache_control) {
                response.headers_mut().insert(header::CACHE_CONTROL, value);
            }
            response
        }
        Err(e) => error_response(&e),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn error_response(error: &Error) -> Response {
    let status = error
        .status_code()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error!("GET /api/posts failed: {}", error);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
