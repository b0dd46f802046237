//! Currency-agnostic price representation using decimal arithmetic.
//!
//! Listings on the marketplace are quoted in a single store currency chosen by
//! the backend, so a price is just an amount. Amounts travel as JSON numbers
//! (the shape the backend and the stored cart use) but are held as
//! [`Decimal`] so totals never accumulate floating point error.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-currency-tagged amount of money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        self.times(rhs)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times() {
        assert_eq!(Price::from_units(90).times(2), Price::from_units(180));
        assert_eq!(Price::from_units(90) * 0, Price::ZERO);
    }

    #[test]
    fn test_sum() {
        let total: Price = [Price::from_units(50), Price::from_units(25)].iter().sum();
        assert_eq!(total, Price::from_units(75));
    }

    #[test]
    fn test_decimal_amounts_do_not_drift() {
        let dime = Price::new(Decimal::new(1, 1));
        let total: Price = std::iter::repeat_n(dime, 3).sum();
        assert_eq!(total, Price::new(Decimal::new(3, 1)));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&Price::new(Decimal::new(1250, 2))).unwrap();
        assert_eq!(json, "12.5");
        let parsed: Price = serde_json::from_str("90").unwrap();
        assert_eq!(parsed, Price::from_units(90));
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(Price::from_units(180).to_string(), "180.00");
    }
}
