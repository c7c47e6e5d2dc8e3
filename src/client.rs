//! HTTP implementation of the remote resource client.

use crate::entity::{NewPost, Post, Resource, UpdatePostBody};
use crate::error::{Error, Result};
use crate::repository::PostsRepository;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Stateless client for the posts API.
///
/// Lists can be routed through the site's own cached endpoint
/// (`GET {site}/api/posts?limit=`) with [`PostsClient::with_site_url`];
/// every other call goes straight to the upstream base URL. Non-2xx answers
/// become `Error::Http`; there is no retry and, unless configured, no timeout.
///
/// # Example
///
/// ```no_run
/// use query_kit::client::PostsClient;
/// use query_kit::repository::PostsRepository;
///
/// # async fn run() -> query_kit::Result<()> {
/// let client = PostsClient::new("https://jsonplaceholder.typicode.com")?;
/// let post = client.get(1).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostsClient {
    http: reqwest::Client,
    base_url: String,
    site_url: Option<String>,
}

impl PostsClient {
    /// Client without an outbound timeout.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// Client with an optional whole-request timeout.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(PostsClient {
            http,
            base_url: trim_base(base_url.into()),
            site_url: None,
        })
    }

    /// Route list calls through the site's cached `/api/posts` endpoint.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(trim_base(site_url.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List posts straight from upstream.
    ///
    /// # Errors
    /// `Error::Http` on non-2xx, `Error::Transport` on connection failure.
    pub async fn fetch_posts(&self, limit: u32) -> Result<Vec<Post>> {
        let url = self.collection_url();
        debug!("GET {}?_limit={}", url, limit);
        self.send_json(self.http.get(url).query(&[("_limit", limit)]))
            .await
    }

    /// List posts through the site's cached endpoint.
    ///
    /// # Errors
    /// `Error::ConfigError` when no site URL is configured, otherwise the
    /// same as [`PostsClient::fetch_posts`].
    pub async fn fetch_posts_cached(&self, limit: u32) -> Result<Vec<Post>> {
        let site = self
            .site_url
            .as_deref()
            .ok_or_else(|| Error::ConfigError("site URL not configured".to_string()))?;
        let url = format!("{}/api/{}", site, Post::collection());
        debug!("GET {}?limit={}", url, limit);
        self.send_json(self.http.get(url).query(&[("limit", limit)]))
            .await
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, Post::collection())
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Transport(format!("invalid response body: {}", e)))
    }
}

impl PostsRepository for PostsClient {
    async fn list(&self, limit: u32) -> Result<Vec<Post>> {
        if self.site_url.is_some() {
            self.fetch_posts_cached(limit).await
        } else {
            self.fetch_posts(limit).await
        }
    }

    async fn get(&self, id: u64) -> Result<Post> {
        let url = self.item_url(id);
        debug!("GET {}", url);
        self.send_json(self.http.get(url)).await
    }

    async fn create(&self, data: &NewPost) -> Result<Post> {
        let url = self.collection_url();
        debug!("POST {}", url);
        self.send_json(self.http.post(url).json(data)).await
    }

    async fn update(&self, id: u64, data: &NewPost) -> Result<Post> {
        let url = self.item_url(id);
        debug!("PUT {}", url);
        let body = UpdatePostBody::new(id, data);
        self.send_json(self.http.put(url).json(&body)).await
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let url = self.item_url(id);
        debug!("DELETE {}", url);
        check_status(self.http.delete(url).send().await?).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `Error::Http`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        body.trim().chars().take(512).collect()
    };
    warn!("Upstream answered {}: {}", status, message);
    Err(Error::Http {
        status: status.as_u16(),
        message,
    })
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
