//! ApplyVoucherHandler - The redemption coordinator.
//!
//! The only handler that records redemptions. Every redemption runs as one
//! ledger transaction:
//!
//! 1. Lock the voucher row by `(vendor_id, coupon_code)`
//! 2. Count the user's redemptions inside the same transaction
//! 3. Evaluate eligibility against the locked snapshot
//! 4. Calculate the discount
//! 5. Insert the usage row and increment the counter
//! 6. Commit, then publish `voucher.used.v1` best-effort
//!
//! A second redemption of the same voucher blocks at step 1 until the
//! first commits or aborts, so the global and per-user caps are re-checked
//! against committed state. Any failure before commit leaves no writes.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::foundation::{
    AuthenticatedCaller, BookingId, CallerRole, CommandMetadata, Money, ServiceId, Timestamp,
    UserId, VendorId,
};
use crate::domain::voucher::{
    evaluate, CouponCode, EligibilityRequest, ServiceType, VoucherError, VoucherEvent,
    VoucherUsage,
};
use crate::ports::{EventPublisher, UsageLedger};

use super::super::publish_best_effort;

/// Command to redeem a voucher against a booking.
#[derive(Debug, Clone)]
pub struct ApplyVoucherCommand {
    pub coupon_code: String,
    pub vendor_id: VendorId,
    pub user_id: UserId,
    pub booking_id: BookingId,
    pub service_type: ServiceType,
    pub service_id: ServiceId,
    pub original_amount: Money,
}

/// Handler for redeeming vouchers.
pub struct ApplyVoucherHandler {
    ledger: Arc<dyn UsageLedger>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ApplyVoucherHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    /// Redeems the voucher and returns the recorded usage.
    ///
    /// # Errors
    ///
    /// - `Ineligible(reason)` with the first failing eligibility check
    /// - `NotFound` when the vendor has no voucher with this code
    /// - `InvalidOrderAmount` when `original_amount <= 0`
    /// - `Infrastructure` on lock timeout or persistence failure (retryable)
    pub async fn handle(
        &self,
        cmd: ApplyVoucherCommand,
        metadata: CommandMetadata,
    ) -> Result<VoucherUsage, VoucherError> {
        authorize(metadata.caller()?, &cmd)?;

        if !cmd.original_amount.is_positive() {
            return Err(VoucherError::InvalidOrderAmount);
        }
        let code = CouponCode::try_new(&cmd.coupon_code)
            .map_err(|_| VoucherError::not_found(&cmd.coupon_code))?;

        let mut tx = self.ledger.begin().await?;

        let voucher = tx
            .lock_voucher_by_code(&cmd.vendor_id, &code)
            .await?
            .ok_or_else(|| VoucherError::not_found(&code))?;

        let prior_user_redemptions = tx.count_user_redemptions(&voucher.id, &cmd.user_id).await?;
        let now = Timestamp::now();
        let request = EligibilityRequest {
            service_type: &cmd.service_type,
            service_id: &cmd.service_id,
            order_amount: cmd.original_amount,
            user_id: Some(&cmd.user_id),
            prior_user_redemptions,
            now,
        };

        if let Err(reason) = evaluate(&voucher, &request) {
            if let Err(err) = tx.rollback().await {
                warn!(voucher_id = %voucher.id, error = %err, "rollback after rejection failed");
            }
            warn!(
                voucher_id = %voucher.id,
                user_id = %cmd.user_id,
                reason = ?reason,
                "voucher redemption rejected"
            );
            return Err(VoucherError::Ineligible(reason));
        }

        let breakdown = voucher.discount.apply(cmd.original_amount);
        let usage = VoucherUsage::record(
            voucher.id,
            cmd.user_id,
            cmd.booking_id,
            cmd.service_type,
            cmd.service_id,
            breakdown,
            now,
        );

        tx.record_usage(&usage).await?;
        let usage_count = tx.increment_usage_counter(&voucher.id).await?;
        tx.commit().await?;

        info!(
            voucher_id = %voucher.id,
            usage_id = %usage.id,
            user_id = %usage.user_id,
            discount = %usage.discount_amount,
            usage_count,
            "voucher redeemed"
        );

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::Used {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id,
                usage_id: usage.id,
                user_id: usage.user_id.clone(),
                booking_id: usage.booking_id.clone(),
                discount_amount: usage.discount_amount,
                final_amount: usage.final_amount,
                occurred_at: usage.applied_at,
            },
        )
        .await;

        Ok(usage)
    }
}

/// End-users redeem for themselves, vendors at their own checkout, and
/// administrators for anyone.
fn authorize(caller: &AuthenticatedCaller, cmd: &ApplyVoucherCommand) -> Result<(), VoucherError> {
    let allowed = match caller.role {
        CallerRole::Admin => true,
        CallerRole::User => caller.id == cmd.user_id.as_str(),
        CallerRole::Vendor => caller.id == cmd.vendor_id.as_str(),
    };
    if allowed {
        Ok(())
    } else {
        Err(VoucherError::unauthorized(
            "caller may not redeem vouchers for this user or vendor",
        ))
    }
}
