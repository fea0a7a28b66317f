//! Money value object.
//!
//! Amounts are stored as integer minor units (cents), never floats, so that
//! discount computation is exact and reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use super::ValidationError;

/// A monetary amount in minor units (e.g. cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a strictly positive amount, naming the offending field on failure.
    pub fn positive(cents: i64, field: &str) -> Result<Self, ValidationError> {
        if cents <= 0 {
            return Err(ValidationError::out_of_range(field, 1, i64::MAX, cents));
        }
        Ok(Self(cents))
    }

    /// Returns the amount in minor units.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_with_two_decimals() {
        assert_eq!(Money::from_cents(25000).to_string(), "250.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-150).to_string(), "-1.50");
    }

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(Money::positive(0, "order_amount").is_err());
        assert!(Money::positive(-1, "order_amount").is_err());
        assert_eq!(Money::positive(1, "order_amount").unwrap().cents(), 1);
    }

    #[test]
    fn subtraction_works_in_minor_units() {
        let total = Money::from_cents(10000) - Money::from_cents(2000);
        assert_eq!(total, Money::from_cents(8000));
    }
}
