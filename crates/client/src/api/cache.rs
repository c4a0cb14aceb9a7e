//! Cache types for catalogue responses.

use ecomm_core::Product;

/// Cached value types, keyed by strings such as `product:{id}`.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
}
