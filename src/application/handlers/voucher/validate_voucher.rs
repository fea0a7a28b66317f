//! ValidateVoucherHandler - Read-only redemption preview.
//!
//! Runs the eligibility checks and the discount calculation against an
//! unlocked snapshot. The answer is advisory: a concurrent redemption may
//! consume the last unit of capacity before the caller applies the voucher.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::domain::foundation::{
    CommandMetadata, Money, ServiceId, Timestamp, UserId, VendorId,
};
use crate::domain::voucher::{
    evaluate, CouponCode, EligibilityRequest, IneligibleReason, ServiceType, Voucher,
    VoucherError,
};
use crate::ports::{UsageLedger, VoucherRepository};

const UNKNOWN_CODE_MESSAGE: &str = "Invalid coupon code";

/// Preview request. `user_id` is optional; without it the per-user limit is
/// not checked.
#[derive(Debug, Clone)]
pub struct ValidateVoucherQuery {
    pub coupon_code: String,
    pub vendor_id: VendorId,
    pub user_id: Option<UserId>,
    pub service_type: ServiceType,
    pub service_id: ServiceId,
    pub order_amount: Money,
}

/// Outcome of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher: Option<Voucher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
}

impl VoucherValidation {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            voucher: None,
            discount_amount: None,
            final_amount: None,
            error: Some(message.into()),
            reason: None,
        }
    }

    fn ineligible(voucher: Voucher, reason: IneligibleReason) -> Self {
        Self {
            is_valid: false,
            voucher: Some(voucher),
            discount_amount: None,
            final_amount: None,
            error: Some(reason.message().to_string()),
            reason: Some(reason),
        }
    }
}

pub struct ValidateVoucherHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
}

impl ValidateVoucherHandler {
    pub fn new(repository: Arc<dyn VoucherRepository>, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { repository, ledger }
    }

    /// Business-rule failures come back as `is_valid: false`. Only
    /// infrastructure failures are returned as `Err`.
    pub async fn handle(
        &self,
        query: ValidateVoucherQuery,
        _metadata: CommandMetadata,
    ) -> Result<VoucherValidation, VoucherError> {
        if !query.order_amount.is_positive() {
            return Ok(VoucherValidation::invalid(
                VoucherError::InvalidOrderAmount.message(),
            ));
        }

        let Ok(code) = CouponCode::try_new(&query.coupon_code) else {
            return Ok(VoucherValidation::invalid(UNKNOWN_CODE_MESSAGE));
        };
        let Some(voucher) = self.repository.find_by_code(&query.vendor_id, &code).await? else {
            return Ok(VoucherValidation::invalid(UNKNOWN_CODE_MESSAGE));
        };

        let prior_user_redemptions = match &query.user_id {
            Some(user_id) => {
                self.ledger
                    .count_user_redemptions(&voucher.id, user_id)
                    .await?
            }
            None => 0,
        };

        let request = EligibilityRequest {
            service_type: &query.service_type,
            service_id: &query.service_id,
            order_amount: query.order_amount,
            user_id: query.user_id.as_ref(),
            prior_user_redemptions,
            now: Timestamp::now(),
        };

        if let Err(reason) = evaluate(&voucher, &request) {
            debug!(voucher_id = %voucher.id, reason = ?reason, "voucher preview rejected");
            return Ok(VoucherValidation::ineligible(voucher, reason));
        }

        let breakdown = voucher.discount.apply(query.order_amount);
        Ok(VoucherValidation {
            is_valid: true,
            voucher: Some(voucher),
            discount_amount: Some(breakdown.discount_amount),
            final_amount: Some(breakdown.final_amount),
            error: None,
            reason: None,
        })
    }
}
