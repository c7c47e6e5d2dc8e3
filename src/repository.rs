//! Remote resource client abstraction.
//!
//! [`PostsRepository`] is the seam between the caches and the system of
//! record. [`PostsClient`](crate::client::PostsClient) implements it over
//! HTTP; [`InMemoryPostsRepository`] implements it in memory with call
//! counters and failure injection, for tests and local runs.
//!
//! # Error Handling
//!
//! Implementations return `Err` for every failed call and never retry:
//! - `Error::Http` for non-2xx responses (status + message)
//! - `Error::Transport` when no response was obtained

use crate::entity::{NewPost, Post, UpdatePostBody, DEFAULT_USER_ID};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Operations offered by the remote posts API.
///
/// Returned futures are `Send` so query fetchers can run on spawned tasks.
pub trait PostsRepository: Send + Sync + 'static {
    /// `GET /posts?_limit=<limit>`
    fn list(&self, limit: u32) -> impl Future<Output = Result<Vec<Post>>> + Send;

    /// `GET /posts/{id}`
    fn get(&self, id: u64) -> impl Future<Output = Result<Post>> + Send;

    /// `POST /posts`
    fn create(&self, data: &NewPost) -> impl Future<Output = Result<Post>> + Send;

    /// `PUT /posts/{id}` with the full body, owner pinned to
    /// [`DEFAULT_USER_ID`].
    fn update(&self, id: u64, data: &NewPost) -> impl Future<Output = Result<Post>> + Send;

    /// `DELETE /posts/{id}`
    fn delete(&self, id: u64) -> impl Future<Output = Result<()>> + Send;
}

// ============================================================================
// In-Memory Repository
// ============================================================================

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list: AtomicUsize,
    pub get: AtomicUsize,
    pub create: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.list,
            &self.get,
            &self.create,
            &self.update,
            &self.delete,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// In-memory posts API.
///
/// Clones share data and counters, so a test can keep one handle for
/// assertions while the caches own another.
///
/// # Example
///
/// ```
/// use query_kit::repository::{InMemoryPostsRepository, PostsRepository};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> query_kit::Result<()> {
/// let repo = InMemoryPostsRepository::seeded(20);
/// assert_eq!(repo.list(10).await?.len(), 10);
/// assert_eq!(repo.calls().list.load(std::sync::atomic::Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryPostsRepository {
    posts: Arc<Mutex<BTreeMap<u64, Post>>>,
    calls: Arc<CallCounts>,
    failure: Arc<Mutex<Option<Error>>>,
    last_update: Arc<Mutex<Option<UpdatePostBody>>>,
    delay: Option<Duration>,
}

impl InMemoryPostsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding posts `1..=count`.
    pub fn seeded(count: u64) -> Self {
        let repo = Self::new();
        for id in 1..=count {
            repo.insert(Post {
                user_id: (id - 1) / 10 + 1,
                id,
                title: format!("post {}", id),
                body: format!("body of post {}", id),
            });
        }
        repo
    }

    /// Delay every call, to widen concurrency windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, post: Post) {
        lock(&self.posts).insert(post.id, post);
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Make every following call fail with `error` until cleared.
    pub fn fail_with(&self, error: Option<Error>) {
        *lock(&self.failure) = error;
    }

    /// Body received by the most recent update.
    pub fn last_update_body(&self) -> Option<UpdatePostBody> {
        lock(&self.last_update).clone()
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.failure).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found() -> Error {
    Error::Http {
        status: 404,
        message: "Not Found".to_string(),
    }
}

impl PostsRepository for InMemoryPostsRepository {
    async fn list(&self, limit: u32) -> Result<Vec<Post>> {
        self.enter(&self.calls.list).await?;
        Ok(lock(&self.posts)
            .values()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: u64) -> Result<Post> {
        self.enter(&self.calls.get).await?;
        lock(&self.posts).get(&id).cloned().ok_or_else(not_found)
    }

    async fn create(&self, data: &NewPost) -> Result<Post> {
        self.enter(&self.calls.create).await?;
        let mut posts = lock(&self.posts);
        let id = posts.keys().next_back().map_or(1, |last| last + 1);
        let post = Post {
            user_id: DEFAULT_USER_ID,
            id,
            title: data.title.clone(),
            body: data.body.clone(),
        };
        posts.insert(id, post.clone());
        Ok(post)
    }

    async fn update(&self, id: u64, data: &NewPost) -> Result<Post> {
        self.enter(&self.calls.update).await?;
        let body = UpdatePostBody::new(id, data);
        *lock(&self.last_update) = Some(body.clone());

        let mut posts = lock(&self.posts);
        if !posts.contains_key(&id) {
            return Err(not_found());
        }
        let post = Post {
            user_id: body.user_id,
            id,
            title: body.title,
            body: body.body,
        };
        posts.insert(id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.enter(&self.calls.delete).await?;
        lock(&self.posts).remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_respects_limit() {
        let repo = InMemoryPostsRepository::seeded(25);
        let posts = repo.list(10).await.unwrap();

        assert_eq!(posts.len(), 10);
        assert_eq!(posts[0].id, 1);
        assert_eq!(repo.calls().list.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let repo = InMemoryPostsRepository::seeded(1);
        let err = repo.get(42).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_create_assigns_next_id() {
        let repo = InMemoryPostsRepository::seeded(100);
        let post = repo.create(&NewPost::new("t", "b")).await.unwrap();
        assert_eq!(post.id, 101);
    }

    #[tokio::test]
    async fn test_update_pins_owner() {
        let repo = InMemoryPostsRepository::seeded(20);
        // post 15 belongs to user 2 before the update
        assert_eq!(repo.get(15).await.unwrap().user_id, 2);

        let post = repo.update(15, &NewPost::new("new", "text")).await.unwrap();
        assert_eq!(post.user_id, DEFAULT_USER_ID);
        assert_eq!(repo.last_update_body().map(|b| b.user_id), Some(1));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let repo = InMemoryPostsRepository::seeded(3);
        repo.fail_with(Some(Error::Transport("down".into())));
        assert!(repo.list(3).await.is_err());

        repo.fail_with(None);
        assert!(repo.list(3).await.is_ok());
        assert_eq!(repo.calls().total(), 2);
    }
}
