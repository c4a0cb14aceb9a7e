//! Catalogue calls.
//!
//! Product lookups by ID and the unfiltered listing are cached; searches are
//! not.

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, instrument};

use ecomm_core::{Product, ProductId};

use super::cache::CacheValue;
use super::{ApiClient, ProductApi};
use crate::error::{ClientError, Result};

const PRODUCTS_KEY: &str = "products";

#[async_trait]
impl ProductApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(PRODUCTS_KEY).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .execute(self.request(Method::GET, &["products"])?)
            .await?;

        self.inner
            .cache
            .insert(PRODUCTS_KEY.to_string(), CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .execute(self.request(Method::GET, &["products", product_id.as_str()])?)
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClientError::Validation("Search query is empty".to_string()));
        }
        let request = self
            .request(Method::GET, &["products", "search"])?
            .query(&[("name", query)]);
        self.execute(request).await
    }
}
