//! Checkout orchestrator.
//!
//! A [`Checkout`] lives for one visit to the checkout step. It loads the
//! shopper's addresses, keeps one of them selected, derives the order total
//! from the cart on every read, and drives order placement:
//!
//! ```text
//! Loading -> Ready -> Placing -> Completed
//!                        |
//!                        +-----> Ready (error recorded, retry allowed)
//! ```
//!
//! The order itself is built by the backend from the stored cart, so placing
//! sends no body. On success only the local cart is emptied.

use tokio::sync::watch;
use tracing::instrument;

use ecomm_core::{Address, CartItem, OrderDraft, OrderReceipt, Price};

use crate::api::{AddressApi, CartApi, OrderApi};
use crate::cart::CartManager;
use crate::error::{ClientError, Result};
use crate::session::SessionStore;

/// Where the checkout is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    /// Addresses are being fetched.
    Loading,
    /// Waiting for the shopper. `error` holds the last placement failure.
    Ready { error: Option<String> },
    /// `POST /orders` is in flight.
    Placing,
    /// The order was accepted.
    Completed { receipt: OrderReceipt },
}

pub struct Checkout<A, C> {
    api: A,
    cart: CartManager<C>,
    session: SessionStore,
    addresses: Vec<Address>,
    selected: Option<Address>,
    state: watch::Sender<CheckoutState>,
}

impl<A, C> std::fmt::Debug for Checkout<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("addresses", &self.addresses.len())
            .field("selected", &self.selected)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<A, C> Checkout<A, C>
where
    A: OrderApi + AddressApi,
    C: CartApi,
{
    /// A checkout in [`CheckoutState::Loading`] that has fetched nothing yet.
    pub fn new(api: A, cart: CartManager<C>, session: SessionStore) -> Self {
        let (state, _) = watch::channel(CheckoutState::Loading);
        Self {
            api,
            cart,
            session,
            addresses: Vec::new(),
            selected: None,
            state,
        }
    }

    /// Open the checkout: load addresses and become [`CheckoutState::Ready`].
    pub async fn enter(api: A, cart: CartManager<C>, session: SessionStore) -> Self {
        let mut checkout = Self::new(api, cart, session);
        checkout.reload_addresses().await;
        checkout
    }

    /// Fetch the address list again.
    ///
    /// Without a token the list is empty and nothing is sent; a failed fetch
    /// is logged and also yields an empty list. The current selection is
    /// kept if an equal address is still listed, otherwise the first entry
    /// is selected. Has no effect once the order is completed.
    #[instrument(skip(self))]
    pub async fn reload_addresses(&mut self) {
        if self.is_completed() {
            tracing::debug!("Order already placed, not reloading addresses");
            return;
        }

        let addresses = if self.session.has_token() {
            match self.api.list_addresses().await {
                Ok(addresses) => addresses,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch addresses");
                    Vec::new()
                }
            }
        } else {
            tracing::debug!("No session, checkout has no addresses");
            Vec::new()
        };

        self.selected = self
            .selected
            .take()
            .filter(|current| addresses.contains(current))
            .or_else(|| addresses.first().cloned());
        self.addresses = addresses;

        tracing::debug!(
            addresses = self.addresses.len(),
            selected = self.selected.is_some(),
            "Addresses loaded"
        );
        self.state.send_replace(CheckoutState::Ready { error: None });
    }

    // -------------------------------------------------------------------------
    // Address selection
    // -------------------------------------------------------------------------

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub const fn selected_address(&self) -> Option<&Address> {
        self.selected.as_ref()
    }

    /// Select `address`, which must equal an entry of [`addresses`](Self::addresses).
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] if it is not listed; the selection is
    /// unchanged.
    pub fn select_address(&mut self, address: &Address) -> Result<()> {
        if !self.addresses.contains(address) {
            return Err(ClientError::Validation(
                "Address is not in your address list".to_string(),
            ));
        }
        self.selected = Some(address.clone());
        Ok(())
    }

    /// Select the address at `index`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] if `index` is out of range.
    pub fn select_index(&mut self, index: usize) -> Result<()> {
        let address = self.addresses.get(index).cloned().ok_or_else(|| {
            ClientError::Validation(format!("No address at index {index}"))
        })?;
        self.selected = Some(address);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Cart views
    // -------------------------------------------------------------------------

    /// The cart holds exactly one line.
    pub fn is_instant_buy(&self) -> bool {
        self.cart.len() == 1
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.cart.items()
    }

    /// Order total, recomputed from the cart on every call.
    pub fn total(&self) -> Price {
        self.cart.total()
    }

    /// What would be ordered right now, if an address is selected.
    pub fn draft(&self) -> Option<OrderDraft> {
        let address = self.selected.clone()?;
        Some(OrderDraft::new(&self.cart.cart(), address))
    }

    // -------------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------------

    pub fn state(&self) -> CheckoutState {
        self.state.borrow().clone()
    }

    /// Watch state transitions. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    fn is_completed(&self) -> bool {
        matches!(*self.state.borrow(), CheckoutState::Completed { .. })
    }

    /// Place the order for the current cart.
    ///
    /// On success the local cart is emptied (the server already emptied its
    /// copy) and the state becomes [`CheckoutState::Completed`].
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`] when no address is selected or the
    ///   order was already placed; nothing is sent and nothing changes
    /// - the request's error otherwise; the state returns to
    ///   [`CheckoutState::Ready`] with the message recorded and the cart is
    ///   left alone, so the call may be retried
    #[instrument(skip(self))]
    pub async fn place_order(&mut self) -> Result<OrderReceipt> {
        if self.is_completed() {
            return Err(ClientError::Validation("Order already placed".to_string()));
        }
        let Some(draft) = self.draft() else {
            return Err(ClientError::Validation(
                "Please select an address".to_string(),
            ));
        };

        tracing::info!(
            lines = draft.items.len(),
            total = %draft.total,
            address = %draft.address.one_line(),
            "Placing order"
        );
        self.state.send_replace(CheckoutState::Placing);

        match self.api.place_order().await {
            Ok(receipt) => {
                tracing::info!(order_id = ?receipt.order_id, "Order placed");
                self.cart.clear_local();
                self.state.send_replace(CheckoutState::Completed {
                    receipt: receipt.clone(),
                });
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to place order");
                self.state.send_replace(CheckoutState::Ready {
                    error: Some(e.user_message()),
                });
                Err(e)
            }
        }
    }
}
