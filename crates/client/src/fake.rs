//! In-memory backend for unit tests.
//!
//! Implements the resource traits against a single user's state, records
//! every call, and can be told to fail or stall specific calls.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use ecomm_core::{
    Address, AddressId, AuthenticatedUser, Cart, CartItem, CartItemId, Email, NewUser, Order,
    OrderId, OrderReceipt, Price, ProductId, ProfileUpdate, User, UserId,
};

use crate::api::{AddressApi, AuthApi, CartApi, OrderApi};
use crate::error::{ClientError, Result};

#[derive(Default)]
struct State {
    cart: Vec<CartItem>,
    addresses: Vec<Address>,
    orders: Vec<Order>,
    prices: HashMap<ProductId, Price>,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    next_id: u32,
}

/// Shared handle to the fake backend; clones see the same state.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    hold_get_cart: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product price; unknown products cost 10.
    pub fn with_price(self, product: &str, price: i64) -> Self {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(ProductId::new(product), Price::new(Decimal::new(price, 0)));
        self
    }

    pub fn with_address(self, address: Address) -> Self {
        self.state.lock().unwrap().addresses.push(address);
        self
    }

    /// Make every later call named `call` fail with HTTP 500.
    pub fn fail(&self, call: &'static str) {
        self.state.lock().unwrap().failing.insert(call);
    }

    pub fn recover(&self, call: &'static str) {
        self.state.lock().unwrap().failing.remove(call);
    }

    /// Stall `get_cart` until the returned handle is notified.
    pub fn hold_get_cart(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_get_cart.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn server_cart(&self) -> Vec<CartItem> {
        self.state.lock().unwrap().cart.clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().unwrap().orders.clone()
    }

    /// Put a line directly into the server-side cart.
    pub fn seed_line(&self, product: &str, quantity: u32) {
        let mut state = self.state.lock().unwrap();
        let line = new_line(&mut state, &ProductId::new(product), quantity);
        state.cart.push(line);
    }

    /// Record `call` and fail it if configured to.
    fn enter(&self, call: &'static str) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(call) {
            return Err(ClientError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("{call} failed"),
            });
        }
        Ok(state)
    }
}

fn new_line(state: &mut State, product_id: &ProductId, quantity: u32) -> CartItem {
    state.next_id += 1;
    CartItem {
        id: Some(CartItemId::new(format!("line-{}", state.next_id))),
        product_id: product_id.clone(),
        product_name: format!("Product {product_id}"),
        price: state
            .prices
            .get(product_id)
            .copied()
            .unwrap_or_else(|| Price::new(Decimal::TEN)),
        quantity,
        image: None,
        rating: None,
    }
}

fn add_line(state: &mut State, product_id: &ProductId, quantity: u32) {
    if let Some(line) = state.cart.iter_mut().find(|l| &l.product_id == product_id) {
        line.quantity += quantity;
    } else {
        let line = new_line(state, product_id, quantity);
        state.cart.push(line);
    }
}

pub fn test_user() -> User {
    User {
        user_id: UserId::new("u1"),
        first_name: "Test".to_owned(),
        last_name: "Shopper".to_owned(),
        email: Email::parse("shopper@example.com").unwrap(),
        phone: String::new(),
    }
}

#[async_trait]
impl CartApi for FakeBackend {
    async fn get_cart(&self) -> Result<Cart> {
        self.enter("get_cart")?;
        let hold = self.hold_get_cart.lock().unwrap().take();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        Ok(Cart::from(self.server_cart()))
    }

    async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.enter("add_to_cart")?;
        add_line(&mut state, product_id, quantity);
        Ok(())
    }

    async fn update_cart_item(&self, item_id: &CartItemId, quantity: u32) -> Result<()> {
        let mut state = self.enter("update_cart_item")?;
        let line = state
            .cart
            .iter_mut()
            .find(|l| l.id.as_ref() == Some(item_id))
            .ok_or_else(|| ClientError::Http {
                status: StatusCode::NOT_FOUND,
                message: "Cart item not found".to_owned(),
            })?;
        line.quantity = quantity;
        Ok(())
    }

    async fn remove_cart_item(&self, item_id: &CartItemId) -> Result<()> {
        let mut state = self.enter("remove_cart_item")?;
        state.cart.retain(|l| l.line_id() != *item_id);
        Ok(())
    }

    async fn clear_cart(&self) -> Result<()> {
        self.enter("clear_cart")?.cart.clear();
        Ok(())
    }

    async fn instant_buy(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.enter("instant_buy")?;
        state.cart.clear();
        add_line(&mut state, product_id, quantity);
        Ok(())
    }
}

#[async_trait]
impl OrderApi for FakeBackend {
    async fn place_order(&self) -> Result<OrderReceipt> {
        let mut state = self.enter("place_order")?;
        if state.cart.is_empty() {
            return Err(ClientError::Http {
                status: StatusCode::BAD_REQUEST,
                message: "Cart is empty".to_owned(),
            });
        }
        let items = std::mem::take(&mut state.cart);
        let total = Cart::from(items.clone()).total();
        let id = OrderId::new(format!("order-{}", state.orders.len() + 1));
        state.orders.push(Order {
            id: Some(id.clone()),
            items: items.clone(),
            ordered_on: None,
            total,
            status: None,
            delivery_address: None,
            payment_method: None,
        });
        Ok(OrderReceipt {
            order_id: Some(id),
            total: Some(total),
            timestamp: None,
            items: u32::try_from(items.len()).ok(),
            message: None,
        })
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.enter("list_orders")?.orders.clone())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.enter("get_order")?
            .orders
            .iter()
            .find(|o| o.id.as_ref() == Some(order_id))
            .cloned()
            .ok_or_else(|| ClientError::Http {
                status: StatusCode::NOT_FOUND,
                message: "Order not found".to_owned(),
            })
    }
}

#[async_trait]
impl AddressApi for FakeBackend {
    async fn list_addresses(&self) -> Result<Vec<Address>> {
        Ok(self.enter("list_addresses")?.addresses.clone())
    }

    async fn add_address(&self, address: &Address) -> Result<()> {
        let mut state = self.enter("add_address")?;
        state.next_id += 1;
        let mut saved = address.clone();
        saved.id = Some(AddressId::new(format!("addr-{}", state.next_id)));
        state.addresses.push(saved);
        Ok(())
    }

    async fn update_address(&self, address_id: &AddressId, address: &Address) -> Result<()> {
        let mut state = self.enter("update_address")?;
        if let Some(slot) = state
            .addresses
            .iter_mut()
            .find(|a| a.id.as_ref() == Some(address_id))
        {
            *slot = Address {
                id: Some(address_id.clone()),
                ..address.clone()
            };
        }
        Ok(())
    }

    async fn delete_address(&self, address_id: &AddressId) -> Result<()> {
        self.enter("delete_address")?
            .addresses
            .retain(|a| a.id.as_ref() != Some(address_id));
        Ok(())
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn register(&self, _user: &NewUser) -> Result<()> {
        self.enter("register")?;
        Ok(())
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser> {
        self.enter("login")?;
        if password != "correct horse" {
            return Err(ClientError::Http {
                status: StatusCode::UNAUTHORIZED,
                message: "login or password incorrect".to_owned(),
            });
        }
        let mut user = test_user();
        user.email = Email::parse(email).unwrap();
        Ok(AuthenticatedUser {
            user,
            token: "fake-token".to_owned(),
            refresh_token: None,
        })
    }

    async fn logout(&self) -> Result<()> {
        self.enter("logout")?;
        Ok(())
    }

    async fn get_profile(&self) -> Result<User> {
        self.enter("get_profile")?;
        Ok(test_user())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        self.enter("update_profile")?;
        let mut user = test_user();
        if let Some(phone) = &update.phone {
            user.phone.clone_from(phone);
        }
        Ok(user)
    }
}
