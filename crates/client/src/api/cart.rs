//! Cart resource calls.
//!
//! Stateless wrappers: each call is one HTTP request. Keeping the local cart
//! in step with the server is [`crate::cart::CartManager`]'s job.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use ecomm_core::{Cart, CartItemId, ProductId};

use super::{ApiClient, CartApi};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct CartLineRequest<'a> {
    product_id: &'a ProductId,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct QuantityRequest {
    quantity: u32,
}

#[async_trait]
impl CartApi for ApiClient {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Cart> {
        let body: serde_json::Value = self.execute(self.authed(Method::GET, &["cart"])?).await?;
        Ok(Cart::from_response(body)?)
    }

    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let request = self
            .authed(Method::POST, &["cart", "add"])?
            .json(&CartLineRequest {
                product_id,
                quantity,
            });
        self.execute_ack(request).await
    }

    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    async fn update_cart_item(&self, item_id: &CartItemId, quantity: u32) -> Result<()> {
        let request = self
            .authed(Method::PUT, &["cart", "items", item_id.as_str()])?
            .json(&QuantityRequest { quantity });
        self.execute_ack(request).await
    }

    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    async fn remove_cart_item(&self, item_id: &CartItemId) -> Result<()> {
        self.execute_ack(self.authed(Method::DELETE, &["cart", "items", item_id.as_str()])?)
            .await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<()> {
        self.execute_ack(self.authed(Method::DELETE, &["cart"])?).await
    }

    #[instrument(skip(self, product_id), fields(product_id = %product_id))]
    async fn instant_buy(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let request = self
            .authed(Method::POST, &["cart", "instantbuy"])?
            .json(&CartLineRequest {
                product_id,
                quantity,
            });
        self.execute_ack(request).await
    }
}
