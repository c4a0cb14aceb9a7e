//! ecomm Core - Shared domain types.
//!
//! This crate provides the types exchanged with the ecomm REST backend:
//! - carts and cart lines mirrored from the server
//! - delivery addresses
//! - orders, order drafts and placement receipts
//! - users, e-mail addresses and products
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no HTTP
//! clients. The `ecomm-client` crate layers the REST client, session state and
//! the cart/checkout orchestration on top of it.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, e-mails and the resource models

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
