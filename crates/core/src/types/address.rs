//! Delivery address type.

use serde::{Deserialize, Serialize};

use crate::types::id::AddressId;

/// A delivery address saved on the user's account.
///
/// Two addresses are equal when every field, including the backend ID,
/// matches. Checkout relies on this to re-find the selected address after the
/// list is reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Backend identifier; absent for addresses not yet saved.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AddressId>,
    /// House name or number.
    #[serde(rename = "house_name", alias = "House", default)]
    pub house: String,
    /// Street name.
    #[serde(rename = "street_name", alias = "Street", default)]
    pub street: String,
    /// City name.
    #[serde(rename = "city_name", alias = "City", default)]
    pub city: String,
    /// Postal code.
    #[serde(rename = "pin_code", alias = "Pincode", default)]
    pub postal_code: String,
}

impl Address {
    /// Create an unsaved address.
    #[must_use]
    pub fn new(
        house: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            house: house.into(),
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Whether every field the backend requires is filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.house, &self.street, &self.city, &self.postal_code]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Format as a single line, e.g. `"12, High St, Leeds - LS1"`.
    ///
    /// Blank fields render as `N/A`.
    #[must_use]
    pub fn one_line(&self) -> String {
        fn or_na(field: &str) -> &str {
            if field.trim().is_empty() { "N/A" } else { field }
        }
        format!(
            "{}, {}, {} - {}",
            or_na(&self.house),
            or_na(&self.street),
            or_na(&self.city),
            or_na(&self.postal_code)
        )
    }
}
