//! Core types for ecomm.
//!
//! Field names follow the backend's JSON documents; aliases cover the older
//! capitalised spellings some records still carry.

pub mod address;
pub mod cart;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod user;

pub use address::Address;
pub use cart::{Cart, CartItem};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderDraft, OrderReceipt, OrderStatus, PaymentMethod};
pub use price::Price;
pub use product::Product;
pub use user::{AuthenticatedUser, NewUser, ProfileUpdate, User};
