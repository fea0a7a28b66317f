//! Voucher domain module.
//!
//! Discount definitions owned by vendors, the rules deciding whether one
//! applies to an order, and the records left behind by redemptions.
//!
//! # Module Structure
//!
//! - `aggregate` - Voucher aggregate entity and its change sets
//! - `applicability` - Service scope (`Applicability`, `ServiceType`)
//! - `audit` - Administrative audit entries
//! - `coupon_code` - Normalized coupon code value object
//! - `discount` - Discount rule and the pure discount calculator
//! - `eligibility` - Ordered eligibility checks
//! - `errors` - `VoucherError`
//! - `events` - Lifecycle events
//! - `limits` - Usage limits and validity window
//! - `usage` - Redemption records and fraud flags

mod aggregate;
mod applicability;
mod audit;
mod coupon_code;
mod discount;
mod eligibility;
mod errors;
mod events;
mod limits;
mod usage;

pub use aggregate::{
    ExpiryOverride, LimitOverride, Voucher, VoucherChanges, VoucherDraft, NO_EXPIRY_DAYS,
};
pub use applicability::{Applicability, ServiceType};
pub use audit::{AdminAction, AdminAuditEntry};
pub use coupon_code::CouponCode;
pub use discount::{calculate_discount, DiscountBreakdown, DiscountRule, DiscountType};
pub use eligibility::{evaluate, EligibilityRequest, IneligibleReason};
pub use errors::VoucherError;
pub use events::{VoucherEvent, SYSTEM_AGGREGATE_ID};
pub use limits::{UsageLimits, ValidityWindow};
pub use usage::{FraudFlag, VoucherUsage};

#[cfg(test)]
pub(crate) use aggregate::test_support;
