//! Auth state holder.
//!
//! [`SessionStore`] owns the current [`Session`] and publishes two independent
//! signals:
//!
//! - every session change on a `watch` channel ([`SessionStore::subscribe`])
//! - an explicit [`AuthEvent::LoggedOut`] notification on a `broadcast`
//!   channel ([`SessionStore::subscribe_events`])
//!
//! On sign-out the cleared session is published first and the logout
//! notification second, so a listener that sees `LoggedOut` can rely on the
//! session already being empty.

use std::sync::Arc;

use ecomm_core::User;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};

/// Capacity of the auth event channel. Slow listeners lag rather than block.
const EVENT_CAPACITY: usize = 16;

/// Client-held identity and bearer token.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Signed-in user, when known.
    pub user: Option<User>,
    token: Option<SecretString>,
}

impl Session {
    /// Session for `user` authenticated by `token`.
    #[must_use]
    pub fn new(user: Option<User>, token: SecretString) -> Self {
        Self {
            user,
            token: Some(token),
        }
    }

    /// The bearer token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Whether a non-empty token is present.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

/// Notifications that are not plain session changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The user signed out; anything cached for them must be dropped.
    LoggedOut,
}

/// Shared handle to the session. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    state: watch::Sender<Session>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .finish()
    }
}

impl SessionStore {
    /// Create a store with no session.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(Session::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionStoreInner { state, events }),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// The current bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner.state.borrow().token.clone()
    }

    /// Whether the session carries a token.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner.state.borrow().has_token()
    }

    /// The signed-in user, if known.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    /// Replace the session, e.g. after a login response.
    pub fn set(&self, session: Session) {
        tracing::debug!(
            user_id = ?session.user.as_ref().map(|u| u.user_id.as_str()),
            has_token = session.has_token(),
            "Session updated"
        );
        self.inner.state.send_replace(session);
    }

    /// Replace the user while keeping the token.
    pub fn set_user(&self, user: User) {
        self.inner.state.send_modify(|session| session.user = Some(user));
    }

    /// Clear the session and then broadcast [`AuthEvent::LoggedOut`].
    pub fn sign_out(&self) {
        self.inner.state.send_replace(Session::default());
        self.notify_logout();
    }

    /// Broadcast [`AuthEvent::LoggedOut`] without touching the session.
    pub fn notify_logout(&self) {
        // No receivers is fine: nothing is caching user data yet.
        let receivers = self.inner.events.send(AuthEvent::LoggedOut).unwrap_or(0);
        tracing::debug!(receivers, "Logout notification sent");
    }

    /// Watch session changes. The receiver starts at the current session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Receive auth events sent after this call.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecomm_core::{Email, UserId};

    use super::*;

    fn user() -> User {
        User {
            user_id: UserId::new("u1"),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: Email::parse("ada@example.com").unwrap(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_new_store_is_signed_out() {
        let store = SessionStore::new();
        assert!(!store.has_token());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_empty_token_does_not_count() {
        let store = SessionStore::new();
        store.set(Session::new(None, SecretString::from("")));
        assert!(!store.has_token());
    }

    #[test]
    fn test_set_and_read_back() {
        let store = SessionStore::new();
        store.set(Session::new(Some(user()), SecretString::from("tok")));
        assert!(store.has_token());
        assert_eq!(store.token().unwrap().expose_secret(), "tok");
        assert_eq!(store.user().unwrap().user_id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn test_sign_out_publishes_session_before_event() {
        let store = SessionStore::new();
        store.set(Session::new(Some(user()), SecretString::from("tok")));

        let mut changes = store.subscribe();
        let mut events = store.subscribe_events();

        store.sign_out();

        assert_eq!(events.recv().await.unwrap(), AuthEvent::LoggedOut);
        // The session was already cleared when the event arrived.
        assert!(!store.has_token());
        assert!(changes.has_changed().unwrap());
        assert!(!changes.borrow_and_update().has_token());
    }

    #[test]
    fn test_notify_without_listeners_is_harmless() {
        SessionStore::new().notify_logout();
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let store = SessionStore::new();
        store.set(Session::new(None, SecretString::from("very-secret")));
        assert!(!format!("{store:?}").contains("very-secret"));
    }
}
