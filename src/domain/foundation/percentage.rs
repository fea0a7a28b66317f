//! Discount percentage value object (1-100 scale).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A whole-number discount percentage between 1 and 100 inclusive.
///
/// Zero is rejected: a voucher that discounts nothing is not a valid definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// One hundred percent.
    pub const HUNDRED: Self = Self(100);

    /// Creates a DiscountPercent, returning error if out of range.
    pub fn try_new(value: i64) -> Result<Self, ValidationError> {
        if !(1..=100).contains(&value) {
            return Err(ValidationError::out_of_range("discount_value", 1, 100, value));
        }
        Ok(Self(value as u8))
    }

    /// Returns the value as u8.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DiscountPercent {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(i64::from(value))
    }
}

impl From<DiscountPercent> for u8 {
    fn from(p: DiscountPercent) -> u8 {
        p.0
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
