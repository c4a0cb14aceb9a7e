//! Order resource calls.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use ecomm_core::{Order, OrderId, OrderReceipt};

use super::{ApiClient, OrderApi};
use crate::error::Result;

/// `GET /orders` body: a bare array or `{ "orders": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderList {
    Bare(Vec<Order>),
    Wrapped { orders: Option<Vec<Order>> },
}

impl From<OrderList> for Vec<Order> {
    fn from(list: OrderList) -> Self {
        match list {
            OrderList::Bare(orders) => orders,
            OrderList::Wrapped { orders } => orders.unwrap_or_default(),
        }
    }
}

/// `GET /orders/{id}` body: the order itself or `{ "order": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderEnvelope {
    Wrapped { order: Box<Order> },
    Bare(Box<Order>),
}

#[async_trait]
impl OrderApi for ApiClient {
    #[instrument(skip(self))]
    async fn place_order(&self) -> Result<OrderReceipt> {
        // No body: the server prices the order from the stored cart.
        self.execute(self.authed(Method::POST, &["orders"])?).await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        let list: OrderList = self.execute(self.authed(Method::GET, &["orders"])?).await?;
        Ok(list.into())
    }

    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        let envelope: OrderEnvelope = self
            .execute(self.authed(Method::GET, &["orders", order_id.as_str()])?)
            .await?;
        Ok(match envelope {
            OrderEnvelope::Wrapped { order } | OrderEnvelope::Bare(order) => *order,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_order_list_accepts_both_shapes() {
        let bare: OrderList = serde_json::from_value(json!([{"_id": "o1", "total_price": 5}])).unwrap();
        assert_eq!(Vec::<Order>::from(bare).len(), 1);

        let wrapped: OrderList =
            serde_json::from_value(json!({"orders": [{"_id": "o1"}, {"_id": "o2"}]})).unwrap();
        assert_eq!(Vec::<Order>::from(wrapped).len(), 2);

        let null: OrderList = serde_json::from_value(json!({"orders": null})).unwrap();
        assert!(Vec::<Order>::from(null).is_empty());
    }

    #[test]
    fn test_order_envelope_unwraps() {
        let wrapped: OrderEnvelope =
            serde_json::from_value(json!({"order": {"_id": "o9", "total_price": 1}})).unwrap();
        let OrderEnvelope::Wrapped { order } = wrapped else {
            panic!("expected wrapped order");
        };
        assert_eq!(order.id, Some(OrderId::new("o9")));
    }
}
