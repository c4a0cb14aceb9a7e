//! Cart state manager.
//!
//! [`CartManager`] holds the client-side copy of the shopper's cart and keeps
//! it equal to the last successful `GET /cart`. It never edits lines locally:
//! every mutation is sent to the backend and followed by a refresh.
//!
//! # Session coupling
//!
//! - Without a session token the local cart is always empty
//! - [`CartManager::watch_session`] re-fetches on every session change and
//!   empties the cart on [`AuthEvent::LoggedOut`]
//! - A refresh that was in flight when the cart was cleared locally is
//!   discarded when it resolves, so a logout can never be undone by a late
//!   response

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::instrument;

use ecomm_core::{Cart, CartItem, CartItemId, Price, ProductId};

use crate::api::CartApi;
use crate::error::{ClientError, Result};
use crate::session::{AuthEvent, SessionStore};

/// Snapshot published on every cart change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart: Cart,
    /// At least one refresh is in flight.
    pub loading: bool,
}

/// Client-side cart. Cheap to clone; clones share state.
pub struct CartManager<A> {
    inner: Arc<CartManagerInner<A>>,
}

struct CartManagerInner<A> {
    api: A,
    session: SessionStore,
    state: watch::Sender<CartState>,
    /// Bumped on every local clear; refreshes started under an older value
    /// are dropped.
    generation: AtomicU64,
    /// Refreshes currently awaiting the backend.
    in_flight: AtomicUsize,
}

/// Counts one refresh as in flight until dropped. The last one out clears
/// `loading`, also when the refresh future is cancelled.
struct InFlight<'a, A> {
    inner: &'a CartManagerInner<A>,
}

impl<'a, A> InFlight<'a, A> {
    fn start(inner: &'a CartManagerInner<A>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        inner.state.send_if_modified(|state| !std::mem::replace(&mut state.loading, true));
        Self { inner }
    }

    /// Whether another refresh is still running besides this one.
    fn others_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 1
    }
}

impl<A> Drop for InFlight<'_, A> {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner
                .state
                .send_if_modified(|state| std::mem::replace(&mut state.loading, false));
        }
    }
}

impl<A> Clone for CartManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> std::fmt::Debug for CartManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Add requests treat a zero quantity as one.
const fn normalize_quantity(quantity: u32) -> u32 {
    if quantity == 0 { 1 } else { quantity }
}

impl<A: CartApi> CartManager<A> {
    /// Create a manager with an empty cart. Nothing is fetched until
    /// [`refresh`](Self::refresh) or [`watch_session`](Self::watch_session).
    pub fn new(api: A, session: SessionStore) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartManagerInner {
                api,
                session,
                state,
                generation: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// The backend this manager talks to.
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// The session this manager follows.
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    // -------------------------------------------------------------------------
    // Readers
    // -------------------------------------------------------------------------

    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().cart.clone()
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.inner.state.borrow().cart.items.clone()
    }

    /// Sum of `price × max(quantity, 1)` over the current lines.
    pub fn total(&self) -> Price {
        self.inner.state.borrow().cart.total()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().cart.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().cart.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Watch cart changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Replace the local cart with the server's.
    ///
    /// Without a token the cart is emptied and nothing is sent. Fetch
    /// failures are logged and leave an empty cart; they never reach the
    /// caller. Overlapping refreshes keep `loading` set until the last one
    /// resolves.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        if !self.inner.session.has_token() {
            self.clear_local();
            return;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let in_flight = InFlight::start(&self.inner);

        let cart = match self.inner.api.get_cart().await {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch cart, showing it empty");
                Cart::empty()
            }
        };

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Dropping cart response that predates a local clear");
            return;
        }

        tracing::debug!(lines = cart.len(), "Cart refreshed");
        self.inner.state.send_replace(CartState {
            cart,
            loading: in_flight.others_running(),
        });
    }

    /// Add `quantity` of `product_id` (zero counts as one), then refresh.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or whatever the add
    /// request failed with. No refresh happens on failure.
    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.require_token()?;
        self.inner
            .api
            .add_to_cart(product_id, normalize_quantity(quantity))
            .await?;
        self.refresh().await;
        Ok(())
    }

    /// Make `product_id` the only line in the cart: clear, add, refresh.
    ///
    /// The three calls are not atomic. If the add fails after the clear
    /// succeeded, the server cart stays empty and the error is returned;
    /// the local cart is not refreshed. [`instant_buy_atomic`] avoids the
    /// window by using the server's single-call endpoint.
    ///
    /// [`instant_buy_atomic`]: Self::instant_buy_atomic
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or the first failing
    /// request's error.
    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn instant_buy(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.require_token()?;
        self.inner.api.clear_cart().await?;
        if let Err(e) = self
            .inner
            .api
            .add_to_cart(product_id, normalize_quantity(quantity))
            .await
        {
            tracing::error!(error = %e, "Instant buy add failed after the cart was cleared");
            return Err(e);
        }
        self.refresh().await;
        Ok(())
    }

    /// Same outcome as [`instant_buy`](Self::instant_buy) in a single
    /// `POST /cart/instantbuy`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or the request's
    /// error; the server cart is untouched in that case.
    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn instant_buy_atomic(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        self.require_token()?;
        self.inner
            .api
            .instant_buy(product_id, normalize_quantity(quantity))
            .await?;
        self.refresh().await;
        Ok(())
    }

    /// Set a line's quantity, then refresh.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token,
    /// [`ClientError::Validation`] for a zero quantity (nothing is sent; use
    /// [`remove`](Self::remove)), or the request's error.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn update(&self, item_id: &CartItemId, quantity: u32) -> Result<()> {
        self.require_token()?;
        if quantity == 0 {
            return Err(ClientError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        self.inner.api.update_cart_item(item_id, quantity).await?;
        self.refresh().await;
        Ok(())
    }

    /// Remove a line, then refresh.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or the request's
    /// error.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: &CartItemId) -> Result<()> {
        self.require_token()?;
        self.inner.api.remove_cart_item(item_id).await?;
        self.refresh().await;
        Ok(())
    }

    /// Empty the server cart, then the local one. No refresh.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or the request's
    /// error; the local cart is left as it was.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.require_token()?;
        self.inner.api.clear_cart().await?;
        self.clear_local();
        Ok(())
    }

    /// Empty the local cart without contacting the server.
    ///
    /// Any refresh still in flight is discarded when it resolves.
    pub fn clear_local(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| {
            let changed = *state != CartState::default();
            if changed {
                *state = CartState::default();
            }
            changed
        });
    }

    fn require_token(&self) -> Result<()> {
        if self.inner.session.has_token() {
            Ok(())
        } else {
            Err(ClientError::not_authenticated())
        }
    }
}

impl<A: CartApi + 'static> CartManager<A> {
    /// Follow the session from a background task.
    ///
    /// Refreshes once immediately, again on every session change (which
    /// empties the cart when the token went away), and empties the cart on
    /// every [`AuthEvent::LoggedOut`]. The task stops when the returned
    /// listener is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch_session(&self) -> SessionListener {
        let manager = self.clone();
        let mut changes = self.inner.session.subscribe();
        let mut events = self.inner.session.subscribe_events();

        let handle = tokio::spawn(async move {
            changes.borrow_and_update();
            manager.refresh().await;

            let mut changes_open = true;
            let mut events_open = true;
            loop {
                tokio::select! {
                    changed = changes.changed(), if changes_open => match changed {
                        Ok(()) => {
                            changes.borrow_and_update();
                            manager.refresh().await;
                        }
                        Err(_) => changes_open = false,
                    },
                    event = events.recv(), if events_open => match event {
                        Ok(AuthEvent::LoggedOut) => {
                            tracing::info!("Logged out, clearing cart");
                            manager.clear_local();
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Auth events lagged, clearing cart");
                            manager.clear_local();
                        }
                        Err(broadcast::error::RecvError::Closed) => events_open = false,
                    },
                    else => break,
                }
            }
            tracing::debug!("Session channels closed, cart listener stopped");
        });

        SessionListener { handle }
    }
}

/// Handle to the task started by [`CartManager::watch_session`].
///
/// Dropping it stops the task.
#[derive(Debug)]
pub struct SessionListener {
    handle: JoinHandle<()>,
}

impl SessionListener {
    /// Whether the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::*;
    use crate::fake::{FakeBackend, test_user};
    use crate::session::Session;

    fn signed_in() -> SessionStore {
        let session = SessionStore::new();
        session.set(Session::new(Some(test_user()), SecretString::from("tok")));
        session
    }

    fn manager(backend: &FakeBackend, session: &SessionStore) -> CartManager<FakeBackend> {
        CartManager::new(backend.clone(), session.clone())
    }

    fn price(amount: i64) -> Price {
        Price::new(Decimal::new(amount, 0))
    }

    /// Wait until the published cart satisfies `done`.
    async fn wait_for(cart: &CartManager<FakeBackend>, done: impl Fn(&CartState) -> bool) {
        let mut rx = cart.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| done(s)))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_without_token_is_empty_and_silent() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &SessionStore::new());

        cart.refresh().await;

        assert!(cart.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_mirrors_server() {
        let backend = FakeBackend::new().with_price("P1", 25);
        backend.seed_line("P1", 2);
        let cart = manager(&backend, &signed_in());

        cart.refresh().await;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total(), price(50));
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_failure_yields_empty_cart() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;
        assert_eq!(cart.len(), 1);

        backend.fail("get_cart");
        cart.refresh().await;

        assert!(cart.is_empty());
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_mutations_without_token_send_nothing() {
        let backend = FakeBackend::new();
        let cart = manager(&backend, &SessionStore::new());
        let p1 = ProductId::new("P1");
        let line = CartItemId::new("line-1");

        assert!(cart.add(&p1, 1).await.unwrap_err().is_unauthorized());
        assert!(cart.instant_buy(&p1, 1).await.unwrap_err().is_unauthorized());
        assert!(cart.instant_buy_atomic(&p1, 1).await.unwrap_err().is_unauthorized());
        assert!(cart.update(&line, 2).await.unwrap_err().is_unauthorized());
        assert!(cart.remove(&line).await.unwrap_err().is_unauthorized());
        assert!(cart.clear().await.unwrap_err().is_unauthorized());

        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_add_then_refresh() {
        let backend = FakeBackend::new().with_price("P1", 25);
        let cart = manager(&backend, &signed_in());

        cart.add(&ProductId::new("P1"), 2).await.unwrap();

        assert_eq!(backend.calls(), vec!["add_to_cart", "get_cart"]);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.total(), price(50));
    }

    #[tokio::test]
    async fn test_add_zero_counts_as_one() {
        let backend = FakeBackend::new();
        let cart = manager(&backend, &signed_in());

        cart.add(&ProductId::new("P1"), 0).await.unwrap();

        assert_eq!(backend.server_cart()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_add_failure_skips_refresh() {
        let backend = FakeBackend::new();
        backend.fail("add_to_cart");
        let cart = manager(&backend, &signed_in());

        let err = cart.add(&ProductId::new("P1"), 1).await.unwrap_err();

        assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(backend.calls(), vec!["add_to_cart"]);
    }

    #[tokio::test]
    async fn test_instant_buy_leaves_single_line() {
        let backend = FakeBackend::new().with_price("P9", 40);
        backend.seed_line("P1", 1);
        backend.seed_line("P2", 3);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;

        cart.instant_buy(&ProductId::new("P9"), 1).await.unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].product_id, ProductId::new("P9"));
        assert_eq!(cart.total(), price(40));
        assert_eq!(
            backend.calls(),
            vec!["get_cart", "clear_cart", "add_to_cart", "get_cart"]
        );
    }

    #[tokio::test]
    async fn test_instant_buy_add_failure_leaves_server_cart_empty() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;
        backend.fail("add_to_cart");

        assert!(cart.instant_buy(&ProductId::new("P9"), 1).await.is_err());

        assert!(backend.server_cart().is_empty());
        // Not refreshed: the local copy still shows the old line.
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_instant_buy_atomic_uses_single_call() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());

        cart.instant_buy_atomic(&ProductId::new("P9"), 0).await.unwrap();

        assert_eq!(backend.calls(), vec!["instant_buy", "get_cart"]);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_update_zero_rejected_before_dispatch() {
        let backend = FakeBackend::new();
        let cart = manager(&backend, &signed_in());

        let err = cart.update(&CartItemId::new("line-1"), 0).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_zero_without_token_is_unauthorized() {
        let backend = FakeBackend::new();
        let cart = manager(&backend, &SessionStore::new());

        let err = cart.update(&CartItemId::new("line-1"), 0).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_and_remove_refresh() {
        let backend = FakeBackend::new().with_price("P1", 5);
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;
        let line = cart.items()[0].line_id();

        cart.update(&line, 4).await.unwrap();
        assert_eq!(cart.total(), price(20));

        cart.remove(&line).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(
            backend.calls(),
            vec!["get_cart", "update_cart_item", "get_cart", "remove_cart_item", "get_cart"]
        );
    }

    #[tokio::test]
    async fn test_clear_does_not_refresh() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;

        cart.clear().await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(backend.calls(), vec!["get_cart", "clear_cart"]);
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_local_cart() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        cart.refresh().await;
        backend.fail("clear_cart");

        assert!(cart.clear().await.is_err());
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_total_counts_zero_quantity_as_one() {
        let backend = FakeBackend::new().with_price("P1", 7);
        backend.seed_line("P1", 0);
        let cart = manager(&backend, &signed_in());

        cart.refresh().await;

        assert_eq!(cart.total(), price(7));
    }

    #[tokio::test]
    async fn test_refresh_in_flight_is_dropped_after_local_clear() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        let release = backend.hold_get_cart();

        let pending = tokio::spawn({
            let cart = cart.clone();
            async move { cart.refresh().await }
        });
        wait_for(&cart, |s| s.loading).await;

        cart.clear_local();
        release.notify_one();
        pending.await.unwrap();

        assert!(cart.is_empty());
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_watch_session_follows_login_and_logout() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 2);
        let session = SessionStore::new();
        let cart = manager(&backend, &session);
        let _listener = cart.watch_session();

        session.set(Session::new(Some(test_user()), SecretString::from("tok")));
        wait_for(&cart, |s| s.cart.len() == 1).await;

        session.sign_out();
        wait_for(&cart, |s| s.cart.is_empty()).await;
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_logout_event_clears_even_with_token() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let session = signed_in();
        let cart = manager(&backend, &session);
        let _listener = cart.watch_session();
        wait_for(&cart, |s| s.cart.len() == 1).await;

        session.notify_logout();

        wait_for(&cart, |s| s.cart.is_empty()).await;
    }

    #[tokio::test]
    async fn test_dropping_listener_stops_task() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let session = signed_in();
        let cart = manager(&backend, &session);
        let listener = cart.watch_session();
        wait_for(&cart, |s| s.cart.len() == 1).await;
        assert!(!listener.is_finished());

        drop(listener);
        tokio::task::yield_now().await;
        session.notify_logout();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_stay_loading_until_last() {
        let backend = FakeBackend::new();
        backend.seed_line("P1", 1);
        let cart = manager(&backend, &signed_in());
        let release = backend.hold_get_cart();

        let slow = tokio::spawn({
            let cart = cart.clone();
            async move { cart.refresh().await }
        });
        wait_for(&cart, |s| s.loading).await;

        cart.refresh().await;
        assert_eq!(cart.len(), 1);
        assert!(cart.is_loading());

        release.notify_one();
        slow.await.unwrap();
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_clears_loading() {
        let backend = FakeBackend::new();
        let cart = manager(&backend, &signed_in());
        let _release = backend.hold_get_cart();

        let pending = tokio::spawn({
            let cart = cart.clone();
            async move { cart.refresh().await }
        });
        wait_for(&cart, |s| s.loading).await;

        pending.abort();
        let _ = pending.await;

        assert!(!cart.is_loading());
    }
}
