//! `GET /api/posts` through the stale-while-revalidate cache

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use query_kit::backend::InMemoryBackend;
use query_kit::entity::Post;
use query_kit::observability::TtlPolicy;
use query_kit::repository::InMemoryPostsRepository;
use query_kit::routes::{router, ServerState};
use query_kit::swr::SwrCache;
use query_kit::Error;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const MAX_AGE: Duration = Duration::from_secs(300);

fn app(repo: &InMemoryPostsRepository) -> Router {
    let cache = SwrCache::new(InMemoryBackend::new()).with_ttl_policy(TtlPolicy::Fixed(MAX_AGE));
    router(ServerState::new(cache, Arc::new(repo.clone()), MAX_AGE))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, cache_control, body)
}

fn posts(body: &[u8]) -> Vec<Post> {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_list_is_cached() {
    let repo = InMemoryPostsRepository::seeded(30);
    let app = app(&repo);

    let (status, cache_control, body) = get(&app, "/api/posts?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        cache_control.as_deref(),
        Some("s-maxage=300, stale-while-revalidate")
    );
    assert_eq!(posts(&body).len(), 5);

    get(&app, "/api/posts?limit=5").await;
    assert_eq!(repo.calls().list.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_limit_uses_default_key() {
    let repo = InMemoryPostsRepository::seeded(30);
    let app = app(&repo);

    let (_, _, by_default) = get(&app, "/api/posts?limit=10").await;
    for uri in ["/api/posts?limit=abc", "/api/posts?limit=0", "/api/posts?limit=-4", "/api/posts"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body, by_default, "{}", uri);
    }
    assert_eq!(repo.calls().list.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_make_one_upstream_call() {
    let repo = InMemoryPostsRepository::seeded(30).with_delay(Duration::from_millis(50));
    let app = app(&repo);

    let (a, b) = tokio::join!(
        get(&app, "/api/posts?limit=10"),
        get(&app, "/api/posts?limit=10")
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(a.2, b.2);
    assert_eq!(repo.calls().list.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_served_while_refreshing() {
    let repo = InMemoryPostsRepository::seeded(3).with_delay(Duration::from_millis(50));
    let app = app(&repo);
    get(&app, "/api/posts?limit=10").await;

    repo.insert(Post {
        user_id: 1,
        id: 4,
        title: "late".into(),
        body: "arrival".into(),
    });
    tokio::time::advance(MAX_AGE + Duration::from_secs(1)).await;

    // stale copy comes back immediately; three readers claim one refresh
    for _ in 0..3 {
        let (_, _, body) = get(&app, "/api/posts?limit=10").await;
        assert_eq!(posts(&body).len(), 3);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    let (_, _, body) = get(&app, "/api/posts?limit=10").await;
    assert_eq!(posts(&body).len(), 4);
    assert_eq!(repo.calls().list.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_serving_stale() {
    let repo = InMemoryPostsRepository::seeded(3);
    let app = app(&repo);
    get(&app, "/api/posts?limit=10").await;

    repo.fail_with(Some(Error::Transport("upstream down".into())));
    tokio::time::advance(MAX_AGE + Duration::from_secs(1)).await;

    let (status, _, body) = get(&app, "/api/posts?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts(&body).len(), 3);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let (status, _, _) = get(&app, "/api/posts?limit=10").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cold_miss_error_maps_status() {
    let repo = InMemoryPostsRepository::seeded(3);
    repo.fail_with(Some(Error::Http {
        status: 502,
        message: "Bad Gateway".into(),
    }));
    let app = app(&repo);

    let (status, _, body) = get(&app, "/api/posts").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn test_healthz() {
    let repo = InMemoryPostsRepository::new();
    let (status, _, body) = get(&app(&repo), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"status":"ok"}"#);
}
