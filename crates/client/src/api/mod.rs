//! REST API client.
//!
//! # Architecture
//!
//! - [`ApiClient`] is the HTTP adapter: it joins paths onto the configured
//!   base URL, attaches `Authorization: Bearer <token>` from the
//!   [`SessionStore`], and turns non-2xx responses into
//!   [`ClientError::Http`] carrying the server's `error` message
//! - One trait per REST resource ([`CartApi`], [`OrderApi`], [`AddressApi`],
//!   [`AuthApi`], [`ProductApi`]) so the cart manager and checkout can be
//!   driven by anything that speaks the same contract
//! - Protected resources refuse to dispatch without a token
//! - Product lookups are cached via `moka` (5 minute TTL by default)

mod addresses;
mod auth;
mod cache;
mod cart;
mod orders;
mod products;

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use url::Url;

use ecomm_core::{
    Address, AddressId, AuthenticatedUser, Cart, CartItemId, NewUser, Order, OrderId,
    OrderReceipt, Product, ProductId, ProfileUpdate, User,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::SessionStore;

use cache::CacheValue;

/// Longest slice of a response body copied into errors and logs.
const ERROR_BODY_LIMIT: usize = 200;

// =============================================================================
// Resource traits
// =============================================================================

/// Cart resource (`/cart`).
#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /cart`.
    async fn get_cart(&self) -> Result<Cart>;

    /// `POST /cart/add` with `{ product_id, quantity }`.
    async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// `PUT /cart/items/{id}` with `{ quantity }`.
    async fn update_cart_item(&self, item_id: &CartItemId, quantity: u32) -> Result<()>;

    /// `DELETE /cart/items/{id}`.
    async fn remove_cart_item(&self, item_id: &CartItemId) -> Result<()>;

    /// `DELETE /cart`.
    async fn clear_cart(&self) -> Result<()>;

    /// `POST /cart/instantbuy`: replace the cart with a single line server-side.
    async fn instant_buy(&self, product_id: &ProductId, quantity: u32) -> Result<()>;
}

/// Order resource (`/orders`).
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// `POST /orders` with no body; the server builds the order from the
    /// stored cart.
    async fn place_order(&self) -> Result<OrderReceipt>;

    /// `GET /orders`.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// `GET /orders/{id}`.
    async fn get_order(&self, order_id: &OrderId) -> Result<Order>;
}

/// Address book resource (`/addresses`).
#[async_trait]
pub trait AddressApi: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<Address>>;
    async fn add_address(&self, address: &Address) -> Result<()>;
    async fn update_address(&self, address_id: &AddressId, address: &Address) -> Result<()>;
    async fn delete_address(&self, address_id: &AddressId) -> Result<()>;
}

/// Account resource (`/auth`, `/user/profile`).
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, user: &NewUser) -> Result<()>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser>;
    async fn logout(&self) -> Result<()>;
    async fn get_profile(&self) -> Result<User>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User>;
}

/// Public product catalogue (`/products`).
#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn get_product(&self, product_id: &ProductId) -> Result<Product>;
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;
}

// =============================================================================
// ApiClient
// =============================================================================

/// HTTP client for the ecomm REST API.
///
/// Cheap to clone; clones share the connection pool, session and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionStore,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client reading its token from `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
                cache,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build the URL for `segments` under the base URL, percent-encoding each
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request, attaching the bearer token when one is present.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let builder = self.inner.client.request(method, url);
        Ok(match self.inner.session.token() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    /// Start a request against a protected resource.
    ///
    /// Fails with [`ClientError::Authentication`] before anything is sent
    /// when the session has no token.
    fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        if !self.inner.session.has_token() {
            tracing::warn!(
                path = %segments.join("/"),
                "Refusing request without a session token"
            );
            return Err(ClientError::not_authenticated());
        }
        self.request(method, segments)
    }

    /// Send a request and return the success body as text.
    async fn send(&self, builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&body, ERROR_BODY_LIMIT * 2),
                "API returned non-success status"
            );
            return Err(ClientError::Http {
                status,
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
            });
        }

        Ok(body)
    }

    /// Send a request and decode the JSON success body.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send(builder).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body, ERROR_BODY_LIMIT * 2),
                "Failed to parse API response"
            );
            ClientError::Parse(e)
        })
    }

    /// Send a request whose success body carries nothing the client needs.
    async fn execute_ack(&self, builder: RequestBuilder) -> Result<()> {
        let body = self.send(builder).await?;
        tracing::debug!(body = %truncate(&body, ERROR_BODY_LIMIT), "Request acknowledged");
        Ok(())
    }
}

/// Pull the server's message out of an error body.
///
/// The backend answers `{"error": "..."}`; a few handlers use `"Error"` or
/// `"message"`. Non-JSON bodies are returned truncated.
fn error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "Error", "message"]
                .iter()
                .find_map(|key| value.get(key)?.as_str().map(str::to_owned))
        });
    Some(from_json.unwrap_or_else(|| truncate(body, ERROR_BODY_LIMIT)))
}

fn truncate(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}
