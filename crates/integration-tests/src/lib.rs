//! Integration test harness for the ecomm client.
//!
//! [`MockBackend`] serves the ecomm REST API from memory on an ephemeral
//! localhost port, so the real `reqwest` client, session handling and cart
//! and checkout managers can be exercised end to end without a database.
//!
//! # Behaviour
//!
//! - Every route lives under `/api` and answers JSON; errors are
//!   `{"error": "..."}` with a 4xx/5xx status
//! - Protected routes require `Authorization: Bearer <token>` for a token
//!   issued by `POST /api/auth/login`
//! - Adding to the cart merges lines per product; placing an order empties
//!   the stored cart
//! - Every request is recorded as `"METHOD /path"`; [`MockBackend::fail`]
//!   makes a route answer 500
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = MockBackend::start().await;
//! backend.add_user("shopper@example.com", "secret");
//! backend.add_product("P1", "Mug", 20);
//!
//! let session = SessionStore::new();
//! let api = ApiClient::new(&backend.config(), session.clone())?;
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use axum::http::Method;
use ecomm_client::ClientConfig;
use ecomm_core::{
    Address, AddressId, Cart, CartItem, CartItemId, Email, Order, OrderId, OrderStatus,
    PaymentMethod, Price, Product, ProductId, User, UserId,
};

// =============================================================================
// State
// =============================================================================

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct Store {
    /// Keyed by lowercased email.
    accounts: HashMap<String, Account>,
    /// Token to account email.
    tokens: HashMap<String, String>,
    products: Vec<Product>,
    carts: HashMap<String, Vec<CartItem>>,
    addresses: HashMap<String, Vec<Address>>,
    orders: HashMap<String, Vec<Order>>,
    requests: Vec<String>,
    failing: HashSet<String>,
}

impl Store {
    /// Resolve the bearer token in `headers` to an account email.
    fn account_for(&self, headers: &HeaderMap) -> ApiResult<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "No Authorization Header Provided"))?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "token is invalid or expired"))
    }

    fn product(&self, product_id: &ProductId) -> ApiResult<&Product> {
        self.products
            .iter()
            .find(|p| p.product_id.as_ref() == Some(product_id) || p.id.as_ref() == Some(product_id))
            .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Product not found"))
    }

    fn add_line(&mut self, email: &str, product_id: &ProductId, quantity: u32) -> ApiResult<()> {
        let product = self.product(product_id)?.clone();
        let quantity = quantity.max(1);
        let cart = self.carts.entry(email.to_string()).or_default();
        if let Some(line) = cart.iter_mut().find(|l| &l.product_id == product_id) {
            line.quantity += quantity;
        } else {
            cart.push(CartItem {
                id: Some(CartItemId::new(Uuid::new_v4().to_string())),
                product_id: product_id.clone(),
                product_name: product.product_name,
                price: product.price,
                quantity,
                image: product.image,
                rating: product.rating,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockState {
    store: Arc<Mutex<Store>>,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "Mock backend error");
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Handle
// =============================================================================

/// A running in-memory backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: MockState,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start() -> Self {
        let state = MockState::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        tracing::debug!(%addr, "Mock backend listening");
        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the REST API, e.g. `http://127.0.0.1:41234/api`.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_url(&self.api_url()).expect("Mock backend URL is valid")
    }

    /// Register an account directly.
    pub fn add_user(&self, email: &str, password: &str) -> UserId {
        let email = Email::parse(email).expect("valid test email");
        let user_id = UserId::new(Uuid::new_v4().to_string());
        self.state.lock().accounts.insert(
            email.as_str().to_string(),
            Account {
                user: User {
                    user_id: user_id.clone(),
                    first_name: "Test".to_string(),
                    last_name: "Shopper".to_string(),
                    email,
                    phone: String::new(),
                },
                password: password.to_string(),
            },
        );
        user_id
    }

    /// Add a catalogue product priced in whole currency units.
    pub fn add_product(&self, product_id: &str, name: &str, price: i64) {
        self.state.lock().products.push(Product {
            id: Some(ProductId::new(Uuid::new_v4().to_string())),
            product_id: Some(ProductId::new(product_id)),
            product_name: name.to_string(),
            price: Price::new(Decimal::new(price, 0)),
            category: Some("Test".to_string()),
            rating: Some(4.5),
            description: None,
            image: None,
            stock: Some(10),
        });
    }

    /// Save an address for `email`, assigning it an ID.
    pub fn add_address(&self, email: &str, address: Address) -> Address {
        let saved = Address {
            id: Some(AddressId::new(Uuid::new_v4().to_string())),
            ..address
        };
        self.state
            .lock()
            .addresses
            .entry(email.to_lowercase())
            .or_default()
            .push(saved.clone());
        saved
    }

    /// The stored cart for `email`.
    pub fn cart_of(&self, email: &str) -> Vec<CartItem> {
        self.state
            .lock()
            .carts
            .get(&email.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Orders placed by `email`.
    pub fn orders_of(&self, email: &str) -> Vec<Order> {
        self.state
            .lock()
            .orders
            .get(&email.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Every request received so far, as `"METHOD /path"`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Make `method path` answer 500 until [`recover`](Self::recover).
    pub fn fail(&self, method: &Method, path: &str) {
        self.state.lock().failing.insert(format!("{method} {path}"));
    }

    pub fn recover(&self, method: &Method, path: &str) {
        self.state.lock().failing.remove(&format!("{method} {path}"));
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: MockState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/products", get(list_products))
        .route("/products/search", get(search_products))
        .route("/products/{id}", get(get_product))
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/items/{id}", put(update_cart_item).delete(remove_cart_item))
        .route("/cart/instantbuy", post(instant_buy))
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/{id}", get(get_order))
        .route("/addresses", get(list_addresses).post(add_address))
        .route("/addresses/{id}", put(update_address).delete(delete_address));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Record the request and apply injected failures.
async fn record_request(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let key = format!("{} {}", request.method(), request.uri().path());
    let fail = {
        let mut store = state.lock();
        store.requests.push(key.clone());
        store.failing.contains(&key)
    };
    if fail {
        return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{key} failed")).into_response();
    }
    next.run(request).await
}

// -----------------------------------------------------------------------------
// Auth
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterBody {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    email: String,
    password: String,
    #[serde(default)]
    phone: String,
}

async fn register(State(state): State<MockState>, Json(body): Json<RegisterBody>) -> ApiResult<(StatusCode, Json<Value>)> {
    let email = Email::parse(&body.email).map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    if body.password.len() < 6 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "password too short"));
    }
    let mut store = state.lock();
    if store.accounts.contains_key(email.as_str()) {
        return Err(ApiError::new(StatusCode::CONFLICT, "user already exists"));
    }
    store.accounts.insert(
        email.as_str().to_string(),
        Account {
            user: User {
                user_id: UserId::new(Uuid::new_v4().to_string()),
                first_name: body.first_name,
                last_name: body.last_name,
                email,
                phone: body.phone,
            },
            password: body.password,
        },
    );
    Ok((StatusCode::CREATED, Json(json!({ "message": "Successfully signed up" }))))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<MockState>, Json(body): Json<LoginBody>) -> ApiResult<Json<Value>> {
    let email = body.email.trim().to_lowercase();
    let mut store = state.lock();
    let user = match store.accounts.get(&email) {
        Some(account) if account.password == body.password => account.user.clone(),
        _ => return Err(ApiError::new(StatusCode::UNAUTHORIZED, "login or password incorrect")),
    };
    let token = Uuid::new_v4().to_string();
    store.tokens.insert(token.clone(), email);

    let mut body = serde_json::to_value(&user).map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    body["token"] = json!(token);
    body["refresh_token"] = json!(Uuid::new_v4().to_string());
    Ok(Json(body))
}

async fn logout(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    let mut store = state.lock();
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        store.tokens.remove(token);
    }
    Json(json!({ "message": "Successfully logged out" }))
}

async fn get_profile(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let store = state.lock();
    let email = store.account_for(&headers)?;
    store
        .accounts
        .get(&email)
        .map(|account| Json(account.user.clone()))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "user not found"))
}

#[derive(Deserialize)]
struct ProfileBody {
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
}

async fn update_profile(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> ApiResult<Json<User>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let account = store
        .accounts
        .get_mut(&email)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "user not found"))?;
    if let Some(first_name) = body.first_name {
        account.user.first_name = first_name;
    }
    if let Some(last_name) = body.last_name {
        account.user.last_name = last_name;
    }
    if let Some(phone) = body.phone {
        account.user.phone = phone;
    }
    Ok(Json(account.user.clone()))
}

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

async fn list_products(State(state): State<MockState>) -> Json<Vec<Product>> {
    Json(state.lock().products.clone())
}

async fn get_product(State(state): State<MockState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    state.lock().product(&ProductId::new(id)).cloned().map(Json)
}

#[derive(Deserialize)]
struct SearchParams {
    name: Option<String>,
}

async fn search_products(
    State(state): State<MockState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let query = params
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Invalid Search Index"))?
        .to_lowercase();
    let store = state.lock();
    Ok(Json(
        store
            .products
            .iter()
            .filter(|p| p.product_name.to_lowercase().contains(&query))
            .cloned()
            .collect(),
    ))
}

// -----------------------------------------------------------------------------
// Cart
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
struct CartLineBody {
    product_id: ProductId,
    #[serde(default)]
    quantity: u32,
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn get_cart(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let store = state.lock();
    let email = store.account_for(&headers)?;
    let items = store.carts.get(&email).cloned().unwrap_or_default();
    Ok(Json(json!({ "items": items })))
}

async fn add_to_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<CartLineBody>,
) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    store.add_line(&email, &body.product_id, body.quantity)?;
    Ok(Json(json!({ "message": "Item added to cart" })))
}

async fn update_cart_item(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<QuantityBody>,
) -> ApiResult<Json<Value>> {
    if body.quantity < 1 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Quantity must be at least 1"));
    }
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let item_id = CartItemId::new(id);
    let line = store
        .carts
        .entry(email)
        .or_default()
        .iter_mut()
        .find(|l| l.id.as_ref() == Some(&item_id))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Cart item not found"))?;
    line.quantity = body.quantity;
    Ok(Json(json!({ "message": "Cart item updated" })))
}

async fn remove_cart_item(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let item_id = CartItemId::new(id);
    let cart = store.carts.entry(email).or_default();
    let before = cart.len();
    cart.retain(|l| l.id.as_ref() != Some(&item_id));
    if cart.len() == before {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Cart item not found"));
    }
    Ok(Json(json!({ "message": "Item removed from cart" })))
}

async fn clear_cart(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    store.carts.remove(&email);
    Ok(Json(json!({ "message": "Cart cleared" })))
}

async fn instant_buy(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<CartLineBody>,
) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    // Validate before touching the cart so a bad product leaves it intact.
    store.product(&body.product_id)?;
    store.carts.remove(&email);
    store.add_line(&email, &body.product_id, body.quantity)?;
    Ok(Json(json!({ "message": "Cart replaced" })))
}

// -----------------------------------------------------------------------------
// Orders
// -----------------------------------------------------------------------------

async fn place_order(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let items = store.carts.remove(&email).unwrap_or_default();
    if items.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Cart is empty"));
    }

    let total = Cart::from(items.clone()).total();
    let ordered_on = chrono::Utc::now();
    let order_id = OrderId::new(Uuid::new_v4().to_string());
    let delivery_address = store
        .addresses
        .get(&email)
        .and_then(|addresses| addresses.first().cloned());
    let line_count = items.len();

    store.orders.entry(email).or_default().push(Order {
        id: Some(order_id.clone()),
        items,
        ordered_on: Some(ordered_on),
        total,
        status: Some(OrderStatus::Pending),
        delivery_address,
        payment_method: Some(PaymentMethod {
            digital: false,
            cod: true,
        }),
    });

    Ok(Json(json!({
        "order_id": order_id,
        "total": total,
        "timestamp": ordered_on,
        "items": line_count,
    })))
}

async fn list_orders(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let store = state.lock();
    let email = store.account_for(&headers)?;
    let orders = store.orders.get(&email).cloned().unwrap_or_default();
    Ok(Json(json!({ "orders": orders })))
}

async fn get_order(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.lock();
    let email = store.account_for(&headers)?;
    let order_id = OrderId::new(id);
    store
        .orders
        .get(&email)
        .and_then(|orders| orders.iter().find(|o| o.id.as_ref() == Some(&order_id)))
        .map(|order| Json(json!({ "order": order })))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Order not found"))
}

// -----------------------------------------------------------------------------
// Addresses
// -----------------------------------------------------------------------------

fn require_complete(address: &Address) -> ApiResult<()> {
    if address.is_complete() {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::BAD_REQUEST, "All address fields are required"))
    }
}

async fn list_addresses(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let store = state.lock();
    let email = store.account_for(&headers)?;
    let addresses = store.addresses.get(&email).cloned().unwrap_or_default();
    Ok(Json(json!({ "addresses": addresses })))
}

async fn add_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(address): Json<Address>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_complete(&address)?;
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let saved = Address {
        id: Some(AddressId::new(Uuid::new_v4().to_string())),
        ..address
    };
    store.addresses.entry(email).or_default().push(saved.clone());
    Ok((StatusCode::CREATED, Json(json!({ "address": saved }))))
}

async fn update_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(address): Json<Address>,
) -> ApiResult<Json<Value>> {
    require_complete(&address)?;
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let address_id = AddressId::new(id);
    let slot = store
        .addresses
        .entry(email)
        .or_default()
        .iter_mut()
        .find(|a| a.id.as_ref() == Some(&address_id))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Address not found"))?;
    *slot = Address {
        id: Some(address_id),
        ..address
    };
    Ok(Json(json!({ "message": "Address updated" })))
}

async fn delete_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut store = state.lock();
    let email = store.account_for(&headers)?;
    let address_id = AddressId::new(id);
    let addresses = store.addresses.entry(email).or_default();
    let before = addresses.len();
    addresses.retain(|a| a.id.as_ref() != Some(&address_id));
    if addresses.len() == before {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Address not found"));
    }
    Ok(Json(json!({ "message": "Address deleted" })))
}
