//! ecomm client library.
//!
//! Talks to the ecomm REST backend and keeps the client-side view of the
//! shopper's session, cart and checkout consistent with it.
//!
//! # Architecture
//!
//! - [`api`] - `reqwest` adapter plus one trait per REST resource
//! - [`session`] - the auth state holder and its change/logout channels
//! - [`auth`] - login, logout and profile calls wired to the session
//! - [`cart`] - cart state manager, re-fetching after every mutation
//! - [`checkout`] - address selection and order placement
//!
//! Nothing here is a global: build a [`session::SessionStore`], hand it to an
//! [`api::ApiClient`], and pass both to the managers that need them.
//!
//! # Example
//!
//! ```rust,ignore
//! use ecomm_client::{ApiClient, AuthService, CartManager, Checkout, ClientConfig, SessionStore};
//!
//! let config = ClientConfig::from_env()?;
//! let session = SessionStore::new();
//! let api = ApiClient::new(&config, session.clone())?;
//!
//! AuthService::new(api.clone(), session.clone()).login("a@b.c", &password).await?;
//!
//! let cart = CartManager::new(api.clone(), session.clone());
//! cart.add(&"P1".into(), 1).await?;
//!
//! let mut checkout = Checkout::enter(api, cart, session).await;
//! let receipt = checkout.place_order().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod fake;

pub use api::{AddressApi, ApiClient, AuthApi, CartApi, OrderApi, ProductApi};
pub use auth::AuthService;
pub use cart::{CartManager, CartState, SessionListener};
pub use checkout::{Checkout, CheckoutState};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use session::{AuthEvent, Session, SessionStore};
