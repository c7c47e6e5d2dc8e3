//! `PostsClient` against a mock HTTP server

use mockito::{Matcher, Server};
use query_kit::client::PostsClient;
use query_kit::entity::NewPost;
use query_kit::repository::PostsRepository;
use query_kit::Error;
use serde_json::json;

fn posts_json(count: u64) -> String {
    let posts: Vec<_> = (1..=count)
        .map(|id| json!({"userId": 1, "id": id, "title": format!("t{}", id), "body": "b"}))
        .collect();
    serde_json::Value::Array(posts).to_string()
}

#[tokio::test]
async fn test_list_sends_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/posts")
        .match_query(Matcher::UrlEncoded("_limit".into(), "3".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(posts_json(3))
        .create_async()
        .await;

    let client = PostsClient::new(server.url()).unwrap();
    let posts = client.list(3).await.unwrap();

    assert_eq!(posts.len(), 3);
    assert_eq!(posts[2].title, "t3");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_through_site_route() {
    let mut server = Server::new_async().await;
    let upstream = server
        .mock("GET", "/posts")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let cached = server
        .mock("GET", "/api/posts")
        .match_query(Matcher::UrlEncoded("limit".into(), "10".into()))
        .with_status(200)
        .with_body(posts_json(2))
        .create_async()
        .await;

    let client = PostsClient::new("http://unused.invalid")
        .unwrap()
        .with_site_url(server.url());
    assert_eq!(client.list(10).await.unwrap().len(), 2);

    cached.assert_async().await;
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_get_non_2xx_is_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/posts/404")
        .with_status(404)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("GET", "/posts/500")
        .with_status(500)
        .create_async()
        .await;

    let client = PostsClient::new(server.url()).unwrap();

    let missing = client.get(404).await.unwrap_err();
    assert_eq!(missing.status_code(), Some(404));
    assert!(matches!(missing, Error::Http { ref message, .. } if message == "{}"));

    let broken = client.get(500).await.unwrap_err();
    assert!(matches!(
        broken,
        Error::Http { status: 500, ref message } if message == "Internal Server Error"
    ));
}

#[tokio::test]
async fn test_update_pins_user_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/posts/5")
        .match_body(Matcher::Json(json!({
            "title": "new title",
            "body": "new body",
            "id": 5,
            "userId": 1
        })))
        .with_status(200)
        .with_body(r#"{"userId": 1, "id": 5, "title": "new title", "body": "new body"}"#)
        .create_async()
        .await;

    let client = PostsClient::new(server.url()).unwrap();
    let post = client
        .update(5, &NewPost::new("new title", "new body"))
        .await
        .unwrap();

    assert_eq!(post.id, 5);
    assert_eq!(post.user_id, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_and_delete() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/posts")
        .match_body(Matcher::Json(json!({"title": "t", "body": "b"})))
        .with_status(201)
        // the placeholder API answers without an owner
        .with_body(r#"{"id": 101, "title": "t", "body": "b"}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/posts/101")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = PostsClient::new(server.url()).unwrap();
    let post = client.create(&NewPost::new("t", "b")).await.unwrap();
    assert_eq!(post.id, 101);
    assert_eq!(post.user_id, 0);

    client.delete(101).await.unwrap();
    create.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // nothing listens on port 9 locally
    let client = PostsClient::new("http://127.0.0.1:9").unwrap();
    let err = client.list(1).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
