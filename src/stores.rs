//! Application state stores.
//!
//! Plain state objects owned by [`AppContext`](crate::context::AppContext)
//! and shared by handle. Clones of a store share its state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Toast duration when the caller gives none.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

/// What a caller supplies; the store assigns the id.
#[derive(Clone, Debug, Default)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

/// Ordered notification queue with timed auto-removal.
#[derive(Clone, Default)]
pub struct NotificationStore {
    items: Arc<Mutex<Vec<Notification>>>,
    next_id: Arc<AtomicU64>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and return its id (`notification-<n>`).
    ///
    /// With a non-zero duration the notification removes itself once the
    /// duration elapses. Auto-removal needs a running tokio runtime and is
    /// skipped without one.
    pub fn add(&self, notification: NewNotification) -> String {
        let id = format!(
            "notification-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        );
        let duration = notification.duration;
        lock(&self.items).push(Notification {
            id: id.clone(),
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            duration,
        });
        debug!("Added {}", id);

        if let Some(after) = duration.filter(|d| !d.is_zero()) {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let store = self.clone();
                    let expiring = id.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(after).await;
                        store.remove(&expiring);
                    });
                }
                Err(_) => debug!("No runtime, {} will not expire", id),
            }
        }
        id
    }

    /// Remove by id; unknown ids are ignored.
    pub fn remove(&self, id: &str) -> bool {
        let mut items = lock(&self.items);
        match items.iter().position(|n| n.id == id) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        lock(&self.items).clear();
    }

    pub fn list(&self) -> Vec<Notification> {
        lock(&self.items).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn has_notifications(&self) -> bool {
        self.count() > 0
    }
}

/// Toast helpers over a [`NotificationStore`].
#[derive(Clone)]
pub struct Toaster {
    store: NotificationStore,
}

impl Toaster {
    pub fn new(store: NotificationStore) -> Self {
        Toaster { store }
    }

    /// Show a toast. Type defaults to `Info` and duration to
    /// [`DEFAULT_TOAST_DURATION`].
    pub fn toast(
        &self,
        kind: Option<NotificationKind>,
        title: impl Into<String>,
        message: Option<String>,
        duration: Option<Duration>,
    ) -> String {
        self.store.add(NewNotification {
            kind: kind.unwrap_or_default(),
            title: title.into(),
            message,
            duration: Some(
                duration
                    .filter(|d| !d.is_zero())
                    .unwrap_or(DEFAULT_TOAST_DURATION),
            ),
        })
    }

    pub fn success(
        &self,
        title: impl Into<String>,
        message: Option<String>,
        duration: Option<Duration>,
    ) -> String {
        self.toast(Some(NotificationKind::Success), title, message, duration)
    }

    pub fn error(
        &self,
        title: impl Into<String>,
        message: Option<String>,
        duration: Option<Duration>,
    ) -> String {
        self.toast(Some(NotificationKind::Error), title, message, duration)
    }

    pub fn warning(
        &self,
        title: impl Into<String>,
        message: Option<String>,
        duration: Option<Duration>,
    ) -> String {
        self.toast(Some(NotificationKind::Warning), title, message, duration)
    }

    pub fn info(
        &self,
        title: impl Into<String>,
        message: Option<String>,
        duration: Option<Duration>,
    ) -> String {
        self.toast(Some(NotificationKind::Info), title, message, duration)
    }
}

// ============================================================================
// Counter
// ============================================================================

#[derive(Debug, Default)]
struct CounterState {
    count: i64,
    history: Vec<i64>,
}

/// Counter that records the value before every change.
#[derive(Clone, Default)]
pub struct CounterStore {
    state: Arc<Mutex<CounterState>>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> i64 {
        lock(&self.state).count
    }

    pub fn history(&self) -> Vec<i64> {
        lock(&self.state).history.clone()
    }

    pub fn double_count(&self) -> i64 {
        self.count().saturating_mul(2)
    }

    /// Most recent history value, 0 when empty.
    pub fn last_value(&self) -> i64 {
        lock(&self.state).history.last().copied().unwrap_or(0)
    }

    /// Changes saturate at the `i64` bounds.
    pub fn increment(&self) {
        self.apply(|count| count.saturating_add(1));
    }

    pub fn decrement(&self) {
        self.apply(|count| count.saturating_sub(1));
    }

    pub fn increment_by(&self, amount: i64) {
        self.apply(|count| count.saturating_add(amount));
    }

    pub fn reset(&self) {
        self.apply(|_| 0);
    }

    pub fn clear_history(&self) {
        lock(&self.state).history.clear();
    }

    fn apply(&self, f: impl FnOnce(i64) -> i64) {
        let mut state = lock(&self.state);
        let previous = state.count;
        state.history.push(previous);
        state.count = f(previous);
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    is_loading: bool,
    error: Option<String>,
}

/// Signed-in user, if any.
#[derive(Clone, Default)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user: User) {
        let mut state = lock(&self.state);
        state.user = Some(user);
        state.error = None;
    }

    pub fn clear_user(&self) {
        let mut state = lock(&self.state);
        state.user = None;
        state.error = None;
    }

    pub fn set_loading(&self, loading: bool) {
        lock(&self.state).is_loading = loading;
    }

    /// Record an error; also ends loading.
    pub fn set_error(&self, error: impl Into<String>) {
        let mut state = lock(&self.state);
        state.error = Some(error.into());
        state.is_loading = false;
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.state).user.clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.state).user.is_some()
    }

    /// User name, `"Guest"` when signed out.
    pub fn user_name(&self) -> String {
        lock(&self.state)
            .user
            .as_ref()
            .map_or_else(|| "Guest".to_string(), |u| u.name.clone())
    }

    /// Upper-cased first letter of each word in the name, `"G"` without one.
    pub fn user_initials(&self) -> String {
        let state = lock(&self.state);
        match state.user.as_ref().filter(|u| !u.name.is_empty()) {
            Some(user) => user
                .name
                .split(' ')
                .filter_map(|word| word.chars().next())
                .flat_map(char::to_uppercase)
                .collect(),
            None => "G".to_string(),
        }
    }
}

// ============================================================================
// UI
// ============================================================================

#[derive(Debug)]
struct UiState {
    sidebar_open: bool,
    is_loading: bool,
}

/// Layout flags.
#[derive(Clone)]
pub struct UiStore {
    state: Arc<Mutex<UiState>>,
}

impl Default for UiStore {
    fn default() -> Self {
        UiStore {
            state: Arc::new(Mutex::new(UiState {
                sidebar_open: true,
                is_loading: false,
            })),
        }
    }
}

impl UiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sidebar_open(&self) -> bool {
        lock(&self.state).sidebar_open
    }

    pub fn toggle_sidebar(&self) {
        let mut state = lock(&self.state);
        state.sidebar_open = !state.sidebar_open;
    }

    pub fn set_sidebar_open(&self, open: bool) {
        lock(&self.state).sidebar_open = open;
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    pub fn set_loading(&self, loading: bool) {
        lock(&self.state).is_loading = loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_ids_and_removal() {
        let store = NotificationStore::new();
        let first = store.add(NewNotification {
            title: "one".into(),
            ..Default::default()
        });
        let second = store.add(NewNotification {
            title: "two".into(),
            ..Default::default()
        });

        assert_eq!(first, "notification-1");
        assert_eq!(second, "notification-2");
        assert_eq!(store.count(), 2);

        assert!(store.remove(&first));
        assert!(!store.remove("notification-99"));
        assert_eq!(store.list()[0].title, "two");

        store.clear();
        assert!(!store.has_notifications());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_default_duration() {
        let store = NotificationStore::new();
        let toaster = Toaster::new(store.clone());
        toaster.success("Saved", None, None);

        let shown = store.list();
        assert_eq!(shown[0].kind, NotificationKind::Success);
        assert_eq!(shown[0].duration, Some(DEFAULT_TOAST_DURATION));

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(store.count(), 1);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(store.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_helpers_forward_duration() {
        let store = NotificationStore::new();
        let toaster = Toaster::new(store.clone());
        toaster.error("Failed", Some("retry later".into()), Some(Duration::from_secs(1)));
        toaster.warning("Careful", None, Some(Duration::from_secs(10)));

        let shown = store.list();
        assert_eq!(shown[0].kind, NotificationKind::Error);
        assert_eq!(shown[0].duration, Some(Duration::from_secs(1)));
        assert_eq!(shown[1].duration, Some(Duration::from_secs(10)));

        tokio::time::sleep(Duration::from_millis(1001)).await;
        let left = store.list();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].title, "Careful");
    }

    #[test]
    fn test_toast_defaults_to_info() {
        let store = NotificationStore::new();
        Toaster::new(store.clone()).toast(None, "Hello", Some("world".into()), None);
        assert_eq!(store.list()[0].kind, NotificationKind::Info);
    }

    #[test]
    fn test_counter() {
        let counter = CounterStore::new();
        assert_eq!(counter.count(), 0);

        counter.increment();
        counter.increment();
        assert_eq!(counter.history(), vec![0, 1]);

        counter.decrement();
        counter.increment_by(3);
        assert_eq!(counter.count(), 4);
        assert_eq!(counter.double_count(), 8);
        assert_eq!(counter.last_value(), 1);

        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.last_value(), 4);

        counter.clear_history();
        assert_eq!(counter.last_value(), 0);
    }

    #[test]
    fn test_counter_saturates() {
        let counter = CounterStore::new();
        counter.increment_by(i64::MAX);
        counter.increment();
        assert_eq!(counter.count(), i64::MAX);
        assert_eq!(counter.double_count(), i64::MAX);

        counter.reset();
        counter.increment_by(i64::MIN);
        counter.decrement();
        assert_eq!(counter.count(), i64::MIN);
        assert_eq!(counter.history(), vec![0, i64::MAX, i64::MAX, 0, i64::MIN]);
    }

    #[test]
    fn test_session_fallbacks() {
        let session = SessionStore::new();
        assert!(!session.is_authenticated());
        assert_eq!(session.user_name(), "Guest");
        assert_eq!(session.user_initials(), "G");

        session.set_loading(true);
        session.set_error("Failed to fetch user");
        assert!(!session.is_loading());

        session.set_user(User {
            id: "u1".into(),
            name: "ada lovelace".into(),
            email: "ada@example.com".into(),
            avatar: None,
        });
        assert!(session.is_authenticated());
        assert!(session.error().is_none());
        assert_eq!(session.user_initials(), "AL");

        session.clear_user();
        assert_eq!(session.user_name(), "Guest");
    }

    #[test]
    fn test_ui_sidebar() {
        let ui = UiStore::new();
        assert!(ui.sidebar_open());
        ui.toggle_sidebar();
        assert!(!ui.sidebar_open());
        ui.set_sidebar_open(true);
        assert!(ui.sidebar_open());
    }
}
