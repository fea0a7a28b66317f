//! Usage limits and validity window value objects.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::VoucherError;

/// Caps on how often a voucher may be redeemed.
///
/// # Invariants
///
/// - `total`, when set, is at least 1
/// - `per_user` is at least 1
/// - neither exceeds [`UsageLimits::MAX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    total: Option<u32>,
    per_user: u32,
}

impl UsageLimits {
    /// Default number of redemptions allowed per user.
    pub const DEFAULT_PER_USER: u32 = 1;

    /// Largest limit the usage columns can hold.
    pub const MAX: u32 = i32::MAX as u32;

    pub fn try_new(total: Option<u32>, per_user: Option<u32>) -> Result<Self, VoucherError> {
        let per_user = per_user.unwrap_or(Self::DEFAULT_PER_USER);
        if per_user == 0 {
            return Err(VoucherError::invalid_usage_limit(
                "usage per user must be at least 1",
            ));
        }
        if total == Some(0) {
            return Err(VoucherError::invalid_usage_limit(
                "total usage limit must be at least 1 when set",
            ));
        }
        if per_user > Self::MAX || total.is_some_and(|t| t > Self::MAX) {
            return Err(VoucherError::invalid_usage_limit(format!(
                "usage limits cannot exceed {}",
                Self::MAX
            )));
        }
        Ok(Self { total, per_user })
    }

    /// Unlimited total usage, one redemption per user.
    pub fn unlimited() -> Self {
        Self {
            total: None,
            per_user: Self::DEFAULT_PER_USER,
        }
    }

    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn per_user(&self) -> u32 {
        self.per_user
    }

    /// Returns true if `used` redemptions leave room for another.
    pub fn has_capacity(&self, used: u32) -> bool {
        self.total.map_or(true, |limit| used < limit)
    }
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// The interval during which a voucher may be redeemed.
///
/// `valid_from < valid_until` always holds; both bounds are inclusive
/// when checking a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    valid_from: Timestamp,
    valid_until: Timestamp,
}

impl ValidityWindow {
    pub fn try_new(valid_from: Timestamp, valid_until: Timestamp) -> Result<Self, VoucherError> {
        if !valid_from.is_before(&valid_until) {
            return Err(VoucherError::InvalidDateRange);
        }
        Ok(Self {
            valid_from,
            valid_until,
        })
    }

    pub fn valid_from(&self) -> Timestamp {
        self.valid_from
    }

    pub fn valid_until(&self) -> Timestamp {
        self.valid_until
    }

    pub fn contains(&self, at: &Timestamp) -> bool {
        !at.is_before(&self.valid_from) && !at.is_after(&self.valid_until)
    }

    pub fn has_ended(&self, at: &Timestamp) -> bool {
        at.is_after(&self.valid_until)
    }
}
