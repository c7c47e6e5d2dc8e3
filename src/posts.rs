//! Query and mutation bindings for posts.
//!
//! | Binding | Key | Invalidates on success |
//! |---|---|---|
//! | [`PostsQueries::list`] | `["posts", {"limit": n}]` | |
//! | [`PostsQueries::get`] | `["post", id]` | |
//! | [`PostsQueries::create`] | | `["posts"]` |
//! | [`PostsQueries::update`] | | `["post", id]`, `["posts"]` |
//! | [`PostsQueries::delete`] | | `["post", id]`, `["posts"]` |

use crate::entity::{NewPost, Post, PostUpdate};
use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::query::{Mutation, Query, QueryClient, QueryOptions};
use crate::repository::PostsRepository;
use serde_json::json;
use std::sync::Arc;

/// Posts bindings over any [`PostsRepository`].
pub struct PostsQueries<R> {
    client: QueryClient,
    repo: Arc<R>,
}

impl<R> Clone for PostsQueries<R> {
    fn clone(&self) -> Self {
        PostsQueries {
            client: self.client.clone(),
            repo: self.repo.clone(),
        }
    }
}

impl<R: PostsRepository> PostsQueries<R> {
    pub fn new(client: QueryClient, repo: Arc<R>) -> Self {
        PostsQueries { client, repo }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Posts list, optionally seeded with already-known posts.
    ///
    /// # Errors
    /// `Error::ValidationError` if the key is bound to another type.
    pub fn list(&self, limit: u32, initial: Option<Vec<Post>>) -> Result<Query<Vec<Post>>> {
        let repo = self.repo.clone();
        self.client.query(
            QueryKey::list::<Post>(json!({ "limit": limit })),
            move || {
                let repo = repo.clone();
                async move { repo.list(limit).await }
            },
            QueryOptions::default().initial_data(initial),
        )
    }

    /// Single post. Without an id the query is disabled and never fetches.
    ///
    /// # Errors
    /// `Error::ValidationError` if the key is bound to another type.
    pub fn get(&self, id: Option<u64>) -> Result<Query<Post>> {
        let repo = self.repo.clone();
        let options = QueryOptions::default().enabled(id.is_some());
        self.client.query(
            QueryKey::item::<Post>(id.as_ref()),
            move || {
                let repo = repo.clone();
                async move {
                    match id {
                        Some(id) => repo.get(id).await,
                        // unreachable: disabled queries never register a fetcher
                        None => Err(Error::ValidationError("post id is required".to_string())),
                    }
                }
            },
            options,
        )
    }

    pub fn create(&self) -> Mutation<NewPost, Post> {
        let repo = self.repo.clone();
        Mutation::new(self.client.clone(), move |data: NewPost| {
            let repo = repo.clone();
            async move { repo.create(&data).await }
        })
        .invalidates(|_, _| vec![QueryKey::all::<Post>()])
    }

    pub fn update(&self) -> Mutation<PostUpdate, Post> {
        let repo = self.repo.clone();
        Mutation::new(self.client.clone(), move |vars: PostUpdate| {
            let repo = repo.clone();
            async move { repo.update(vars.id, &vars.data).await }
        })
        .invalidates(|vars, _| {
            vec![
                QueryKey::item::<Post>(Some(&vars.id)),
                QueryKey::all::<Post>(),
            ]
        })
    }

    pub fn delete(&self) -> Mutation<u64, ()> {
        let repo = self.repo.clone();
        Mutation::new(self.client.clone(), move |id: u64| {
            let repo = repo.clone();
            async move { repo.delete(id).await }
        })
        .invalidates(|id, _| {
            vec![
                QueryKey::item::<Post>(Some(id)),
                QueryKey::all::<Post>(),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryClientConfig, QueryStatus};
    use crate::repository::InMemoryPostsRepository;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn hooks() -> (PostsQueries<InMemoryPostsRepository>, InMemoryPostsRepository) {
        let repo = InMemoryPostsRepository::seeded(30);
        let client = QueryClient::with_config(QueryClientConfig {
            stale_time: Duration::from_secs(60),
            ..QueryClientConfig::default()
        });
        (PostsQueries::new(client, Arc::new(repo.clone())), repo)
    }

    #[tokio::test]
    async fn test_list_binding() {
        let (posts, repo) = hooks();
        let list = posts.list(5, None).unwrap();
        assert_eq!(list.key().to_string(), r#"["posts",{"limit":5}]"#);

        let state = list.observe().await;
        assert_eq!(state.data.map(|p| p.len()), Some(5));
        assert_eq!(repo.calls().list.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_without_id_is_disabled() {
        let (posts, repo) = hooks();
        let query = posts.get(None).unwrap();
        assert!(!query.is_enabled());
        assert_eq!(query.observe().await.status, QueryStatus::Idle);
        assert_eq!(repo.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_delete_invalidates_item_and_lists() {
        let (posts, repo) = hooks();
        let list = posts.list(10, None).unwrap();
        let item = posts.get(Some(3)).unwrap();
        list.observe().await;
        item.observe().await;

        posts.delete().mutate(3).await.unwrap();
        tokio::join!(list.observe(), item.observe());

        assert_eq!(repo.calls().list.load(Ordering::SeqCst), 2);
        assert_eq!(repo.calls().get.load(Ordering::SeqCst), 2);
        // the refetch of the deleted post fails, earlier data stays
        let state = item.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.data.map(|p| p.id), Some(3));
        assert!(list.data().is_some_and(|p| p.iter().all(|post| post.id != 3)));
    }
}
