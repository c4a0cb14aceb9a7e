//! Decimal price representation.
//!
//! The backend stores prices as JSON numbers. `Price` keeps them as
//! `rust_decimal::Decimal` so sums like `10 * 2 + 5` stay exact, and writes
//! them back out as numbers.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store's single currency.
///
/// Displays with exactly two decimal places:
///
/// ```
/// use ecomm_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(25, 0));
/// assert_eq!(price.to_string(), "25.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display with a currency symbol (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${self}")
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(2))
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_two_decimals() {
        assert_eq!(Price::new(Decimal::new(20, 0)).to_string(), "20.00");
        assert_eq!(Price::from_cents(1999).to_string(), "19.99");
        assert_eq!(Price::from_cents(1999).display(), "$19.99");
    }

    #[test]
    fn test_deserializes_json_numbers() {
        let price: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(price, Price::from_cents(1250));

        let whole: Price = serde_json::from_str("20").unwrap();
        assert_eq!(whole, Price::new(Decimal::new(20, 0)));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(Price::from_cents(1250)).unwrap();
        assert!(json.is_number());
    }

    #[test]
    fn test_sum_and_multiply() {
        let total: Price = [Price::new(Decimal::TEN) * 2, Price::new(Decimal::new(5, 0))]
            .into_iter()
            .sum();
        assert_eq!(total.to_string(), "25.00");
    }
}
