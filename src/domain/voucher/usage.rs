//! Redemption records and fraud flags.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    BookingId, Money, ServiceId, Timestamp, UserId, VoucherId, VoucherUsageId,
};

use super::{DiscountBreakdown, ServiceType};

/// One successful redemption. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherUsage {
    pub id: VoucherUsageId,
    pub voucher_id: VoucherId,
    pub user_id: UserId,
    pub booking_id: BookingId,
    pub original_amount: Money,
    pub discount_amount: Money,
    /// Always `original_amount - discount_amount`.
    pub final_amount: Money,
    pub service_type: ServiceType,
    pub service_id: ServiceId,
    pub applied_at: Timestamp,
}

impl VoucherUsage {
    /// Builds the record for a redemption from its computed breakdown.
    pub fn record(
        voucher_id: VoucherId,
        user_id: UserId,
        booking_id: BookingId,
        service_type: ServiceType,
        service_id: ServiceId,
        breakdown: DiscountBreakdown,
        applied_at: Timestamp,
    ) -> Self {
        Self {
            id: VoucherUsageId::new(),
            voucher_id,
            user_id,
            booking_id,
            original_amount: breakdown.original_amount,
            discount_amount: breakdown.discount_amount,
            final_amount: breakdown.final_amount,
            service_type,
            service_id,
            applied_at,
        }
    }
}

/// Administrative mark on a redemption suspected to be fraudulent.
///
/// Stored beside the usage row rather than on it. Flagging does not reverse
/// the discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudFlag {
    pub usage_id: VoucherUsageId,
    pub voucher_id: VoucherId,
    pub reason: String,
    pub flagged_by: String,
    pub flagged_at: Timestamp,
}
