//! Composition root for the client side.

use crate::client::PostsClient;
use crate::config::Settings;
use crate::error::Result;
use crate::posts::PostsQueries;
use crate::query::QueryClient;
use crate::stores::{CounterStore, NotificationStore, SessionStore, Toaster, UiStore};
use std::sync::Arc;

/// Owns every long-lived piece of application state.
///
/// Modules receive what they need from here by handle; nothing is global.
pub struct AppContext {
    pub settings: Settings,
    pub query_client: QueryClient,
    pub posts: PostsQueries<PostsClient>,
    pub notifications: NotificationStore,
    pub toaster: Toaster,
    pub counter: CounterStore,
    pub session: SessionStore,
    pub ui: UiStore,
}

impl AppContext {
    /// Wire the client stack from `settings`.
    ///
    /// Lists read through the site's cached route; single-post reads and
    /// writes go straight to the upstream API.
    ///
    /// # Errors
    /// `Error::ConfigError` if the HTTP client cannot be built.
    pub fn new(settings: Settings) -> Result<Self> {
        let http = PostsClient::with_timeout(&settings.api_base_url, settings.http_timeout())?
            .with_site_url(&settings.site_url);
        let query_client = QueryClient::with_config(settings.query_config());
        let notifications = NotificationStore::new();

        Ok(AppContext {
            posts: PostsQueries::new(query_client.clone(), Arc::new(http)),
            toaster: Toaster::new(notifications.clone()),
            query_client,
            notifications,
            counter: CounterStore::new(),
            session: SessionStore::new(),
            ui: UiStore::new(),
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;

    #[test]
    fn test_context_wiring() {
        let settings = Settings::from_vars(Map::new()).unwrap();
        let ctx = AppContext::new(settings).unwrap();

        assert_eq!(
            ctx.posts.repository().base_url(),
            "https://jsonplaceholder.typicode.com"
        );
        assert!(ctx.query_client.is_empty());

        ctx.toaster.info("hello", None, None);
        assert_eq!(ctx.notifications.count(), 1);
    }
}
