//! Cart lines and the cart snapshot mirrored from the server.

use serde::{Deserialize, Serialize};

use crate::types::id::{CartItemId, ProductId};
use crate::types::price::Price;

/// One line of the user's cart as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line identifier assigned by the backend.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CartItemId>,
    /// Product this line refers to.
    #[serde(alias = "Product_ID")]
    pub product_id: ProductId,
    /// Product name captured when the line was added.
    #[serde(default)]
    pub product_name: String,
    /// Unit price captured when the line was added.
    #[serde(default)]
    pub price: Price,
    /// Units on this line. The backend may report 0 for legacy lines.
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl CartItem {
    /// Quantity used for pricing: a missing or zero quantity counts as one.
    #[must_use]
    pub fn effective_quantity(&self) -> u32 {
        self.quantity.max(1)
    }

    /// Unit price times the effective quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.effective_quantity()
    }

    /// Identifier to address this line in update/remove calls.
    ///
    /// Falls back to the product ID for lines the backend returned without
    /// a line ID; the remove endpoint matches either.
    #[must_use]
    pub fn line_id(&self) -> CartItemId {
        self.id
            .clone()
            .unwrap_or_else(|| CartItemId::new(self.product_id.as_str()))
    }
}

/// An ordered sequence of cart lines.
///
/// No uniqueness is enforced on the client; the server decides whether adding
/// an existing product bumps a quantity or appends a line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in server order.
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from the body of a `GET /cart` response.
    ///
    /// A missing `items` field, or one that is not an array, yields an empty
    /// cart.
    ///
    /// # Errors
    ///
    /// Returns an error if `items` is an array whose entries are not cart
    /// lines.
    pub fn from_response(body: serde_json::Value) -> Result<Self, serde_json::Error> {
        let serde_json::Value::Object(mut fields) = body else {
            return Ok(Self::empty());
        };
        match fields.remove("items") {
            Some(items @ serde_json::Value::Array(_)) => Ok(Self {
                items: serde_json::from_value(items)?,
            }),
            _ => Ok(Self::empty()),
        }
    }

    /// Sum of `price × max(quantity, 1)` over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines, counting each line at least once.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(CartItem::effective_quantity).sum()
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn line(product: &str, price: i64, quantity: u32) -> CartItem {
        CartItem {
            id: None,
            product_id: ProductId::new(product),
            product_name: product.to_owned(),
            price: Price::new(Decimal::new(price, 0)),
            quantity,
            image: None,
            rating: None,
        }
    }

    #[test]
    fn test_total_of_mixed_lines() {
        let cart = Cart::from(vec![line("A", 10, 2), line("B", 5, 1)]);
        assert_eq!(cart.total().to_string(), "25.00");
    }

    #[test]
    fn test_zero_quantity_counts_once() {
        let cart = Cart::from(vec![line("A", 7, 0)]);
        assert_eq!(cart.total(), Price::new(Decimal::new(7, 0)));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_from_response_reads_items() {
        let body = json!({
            "items": [{"_id": "l1", "product_id": "P1", "product_name": "Mug", "price": 20, "quantity": 1}],
            "total": 20
        });
        let cart = Cart::from_response(body).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items[0].id, Some(CartItemId::new("l1")));
        assert_eq!(cart.total().to_string(), "20.00");
    }

    #[test]
    fn test_from_response_defaults_to_empty() {
        assert!(Cart::from_response(json!({})).unwrap().is_empty());
        assert!(Cart::from_response(json!({"items": null})).unwrap().is_empty());
        assert!(Cart::from_response(json!({"items": "nope"})).unwrap().is_empty());
        assert!(Cart::from_response(json!([1, 2])).unwrap().is_empty());
    }

    #[test]
    fn test_from_response_rejects_malformed_lines() {
        assert!(Cart::from_response(json!({"items": [{"price": 1}]})).is_err());
    }

    #[test]
    fn test_line_id_falls_back_to_product() {
        let item = line("P9", 1, 1);
        assert_eq!(item.line_id(), CartItemId::new("P9"));
    }
}
