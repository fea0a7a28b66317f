//! Discount rule and discount calculator.
//!
//! The calculator is a pure function: identical inputs always produce
//! identical outputs, which lets a redemption re-run the calculation inside
//! its transaction and arrive at the same figures an earlier preview showed.
//!
//! Percentage discounts are computed in integer minor units and rounded down,
//! so a discount is never larger than the exact percentage.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DiscountPercent, Money};

use super::VoucherError;

/// How `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a whole percentage of the order amount.
    Percentage,
    /// `discount_value` is an amount in minor units.
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "percentage" => Some(DiscountType::Percentage),
            "fixed_amount" => Some(DiscountType::FixedAmount),
            _ => None,
        }
    }
}

/// A validated discount definition.
///
/// # Invariants
///
/// - `value > 0`
/// - Percentage values are at most 100
/// - `max_discount`, when present, is positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    kind: DiscountType,
    value: i64,
    max_discount: Option<Money>,
}

impl DiscountRule {
    /// Builds a rule from raw values.
    ///
    /// # Errors
    ///
    /// `InvalidDiscountValue` when the value is not positive, a percentage
    /// exceeds 100, or the cap is not positive.
    pub fn try_new(
        kind: DiscountType,
        value: i64,
        max_discount: Option<Money>,
    ) -> Result<Self, VoucherError> {
        if value <= 0 {
            return Err(VoucherError::invalid_discount(
                "discount value must be greater than zero",
            ));
        }
        if kind == DiscountType::Percentage {
            DiscountPercent::try_new(value).map_err(|_| {
                VoucherError::invalid_discount("percentage must be between 1 and 100")
            })?;
        }
        if let Some(cap) = max_discount {
            if !cap.is_positive() {
                return Err(VoucherError::invalid_discount(
                    "maximum discount amount must be greater than zero",
                ));
            }
        }
        Ok(Self {
            kind,
            value,
            max_discount,
        })
    }

    pub fn kind(&self) -> DiscountType {
        self.kind
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn max_discount(&self) -> Option<Money> {
        self.max_discount
    }

    /// Returns a copy with a different cap.
    pub fn with_max_discount(self, max_discount: Option<Money>) -> Result<Self, VoucherError> {
        Self::try_new(self.kind, self.value, max_discount)
    }

    /// Computes the discount this rule grants on `order_amount`.
    pub fn apply(&self, order_amount: Money) -> DiscountBreakdown {
        calculate_discount(self.kind, self.value, order_amount, self.max_discount)
    }
}

/// Result of a discount calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub original_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Computes the discount for an order.
///
/// 1. Percentage: `order * value / 100` (rounded down); FixedAmount: `value`
/// 2. Capped at `cap` when present
/// 3. Clamped to `[0, order]` so the final amount is never negative
pub fn calculate_discount(
    kind: DiscountType,
    value: i64,
    order_amount: Money,
    cap: Option<Money>,
) -> DiscountBreakdown {
    let order = order_amount.cents().max(0);

    let raw: i128 = match kind {
        DiscountType::Percentage => i128::from(order) * i128::from(value) / 100,
        DiscountType::FixedAmount => i128::from(value),
    };

    let capped = match cap {
        Some(cap) => raw.min(i128::from(cap.cents())),
        None => raw,
    };

    let clamped = capped.clamp(0, i128::from(order));
    // clamped lies within [0, order] and order fits in i64
    let discount = Money::from_cents(clamped as i64);

    DiscountBreakdown {
        original_amount: order_amount,
        discount_amount: discount,
        final_amount: Money::from_cents(order) - discount,
    }
}
