//! Orders: the client-side draft, the placement receipt and the stored
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::address::Address;
use crate::types::cart::{Cart, CartItem};
use crate::types::id::OrderId;
use crate::types::price::Price;

/// Order status reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
    /// Any status this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

/// How an order was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(default)]
    pub digital: bool,
    /// Cash on delivery.
    #[serde(default)]
    pub cod: bool,
}

/// Order as stored on the user's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id", alias = "order_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    /// Cart lines captured when the order was placed.
    #[serde(rename = "order_list", alias = "items", default)]
    pub items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered_on: Option<DateTime<Utc>>,
    #[serde(rename = "total_price", alias = "total", default)]
    pub total: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

/// Client-side picture of the order about to be placed.
///
/// Built from the cart snapshot and the selected address for display. The
/// placement request carries no body; the backend derives the order from the
/// user's stored cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDraft {
    pub items: Vec<CartItem>,
    pub address: Address,
    pub total: Price,
}

impl OrderDraft {
    /// Snapshot `cart` for delivery to `address`.
    #[must_use]
    pub fn new(cart: &Cart, address: Address) -> Self {
        Self {
            items: cart.items.clone(),
            address,
            total: cart.total(),
        }
    }
}

/// Response to `POST /orders`.
///
/// Every field is optional because the backend has returned both full
/// receipts and bare acknowledgements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of lines ordered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::types::id::ProductId;

    #[test]
    fn test_order_reads_backend_record() {
        let order: Order = serde_json::from_value(json!({
            "_id": "o1",
            "order_list": [{"product_id": "P1", "product_name": "Mug", "price": 20, "quantity": 1}],
            "ordered_on": "2024-05-01T10:00:00Z",
            "total_price": 20,
            "payment_method": {"digital": false, "cod": true},
            "status": "completed"
        }))
        .unwrap();

        assert_eq!(order.id, Some(OrderId::new("o1")));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total.to_string(), "20.00");
        assert_eq!(order.status, Some(OrderStatus::Completed));
        assert!(order.payment_method.unwrap().cod);
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(status, OrderStatus::Other("shipped".to_owned()));
        assert_eq!(status.to_string(), "shipped");
    }

    #[test]
    fn test_receipt_accepts_bare_ack() {
        let receipt: OrderReceipt =
            serde_json::from_value(json!({"message": "Order placed"})).unwrap();
        assert_eq!(receipt.message.as_deref(), Some("Order placed"));
        assert!(receipt.order_id.is_none());
    }

    #[test]
    fn test_draft_snapshots_cart() {
        let cart = Cart::from(vec![CartItem {
            id: None,
            product_id: ProductId::new("P1"),
            product_name: "Mug".to_owned(),
            price: Price::new(Decimal::new(20, 0)),
            quantity: 2,
            image: None,
            rating: None,
        }]);
        let draft = OrderDraft::new(&cart, Address::new("1", "A St", "B", "C"));
        assert_eq!(draft.items, cart.items);
        assert_eq!(draft.total.to_string(), "40.00");
    }
}
