//! Eligibility evaluator.
//!
//! A pure decision over a voucher snapshot and a redemption request. The
//! checks run in a fixed order and the first failure is reported:
//!
//! 1. `NotActive`
//! 2. `ExpiredOrNotYetValid`
//! 3. `BelowMinimumOrder`
//! 4. `ServiceNotApplicable`
//! 5. `GlobalLimitExceeded`
//! 6. `UserLimitExceeded` (only when a user is supplied)
//!
//! The order decides which message a partially eligible caller sees, so it
//! must not be rearranged.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ErrorCode, Money, ServiceId, Timestamp, UserId};

use super::{ServiceType, Voucher};

/// Why a voucher cannot be redeemed for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibleReason {
    NotActive,
    ExpiredOrNotYetValid,
    BelowMinimumOrder,
    ServiceNotApplicable,
    GlobalLimitExceeded,
    UserLimitExceeded,
}

impl IneligibleReason {
    pub fn code(&self) -> ErrorCode {
        match self {
            IneligibleReason::NotActive => ErrorCode::VoucherNotActive,
            IneligibleReason::ExpiredOrNotYetValid => ErrorCode::VoucherExpiredOrNotYetValid,
            IneligibleReason::BelowMinimumOrder => ErrorCode::BelowMinimumOrder,
            IneligibleReason::ServiceNotApplicable => ErrorCode::ServiceNotApplicable,
            IneligibleReason::GlobalLimitExceeded => ErrorCode::GlobalLimitExceeded,
            IneligibleReason::UserLimitExceeded => ErrorCode::UserLimitExceeded,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            IneligibleReason::NotActive => "Voucher is not active",
            IneligibleReason::ExpiredOrNotYetValid => "Voucher is expired or not yet valid",
            IneligibleReason::BelowMinimumOrder => {
                "Order amount is below the voucher's minimum order value"
            }
            IneligibleReason::ServiceNotApplicable => {
                "Voucher is not applicable to this service"
            }
            IneligibleReason::GlobalLimitExceeded => "Voucher usage limit has been reached",
            IneligibleReason::UserLimitExceeded => {
                "You have already used this voucher the maximum number of times"
            }
        }
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The request side of an eligibility check.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityRequest<'a> {
    pub service_type: &'a ServiceType,
    pub service_id: &'a ServiceId,
    pub order_amount: Money,
    /// Absent for anonymous previews, which skips the per-user check.
    pub user_id: Option<&'a UserId>,
    /// Successful redemptions of this voucher by `user_id` so far.
    pub prior_user_redemptions: u32,
    pub now: Timestamp,
}

/// Evaluates a voucher against a request.
pub fn evaluate(voucher: &Voucher, request: &EligibilityRequest<'_>) -> Result<(), IneligibleReason> {
    if !voucher.is_active {
        return Err(IneligibleReason::NotActive);
    }

    if !voucher.validity.contains(&request.now) {
        return Err(IneligibleReason::ExpiredOrNotYetValid);
    }

    if let Some(minimum) = voucher.min_order_value {
        if request.order_amount < minimum {
            return Err(IneligibleReason::BelowMinimumOrder);
        }
    }

    if !voucher
        .applicability
        .matches(request.service_type, request.service_id)
    {
        return Err(IneligibleReason::ServiceNotApplicable);
    }

    if !voucher.limits.has_capacity(voucher.current_usage_count) {
        return Err(IneligibleReason::GlobalLimitExceeded);
    }

    if request.user_id.is_some() && request.prior_user_redemptions >= voucher.limits.per_user() {
        return Err(IneligibleReason::UserLimitExceeded);
    }

    Ok(())
}
