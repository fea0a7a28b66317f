//! Administrative control surface.
//!
//! Every handler here requires administrator capability instead of voucher
//! ownership. Mutations that touch existing vouchers go through the same
//! ledger transaction and row locks as redemptions, so an administrative
//! change never races a live redemption.
//!
//! After a successful mutation each handler appends an `AdminAuditEntry`
//! and publishes a `voucher.admin.*` event tagged `ADMIN`.

mod bulk_deactivate;
mod bulk_update;
mod cleanup_expired;
mod emergency_toggle;
mod force_delete;
mod mark_usage_fraudulent;
mod override_limits;
mod reconcile_counter;
mod system_promotion;
mod vendor_status;

pub use bulk_deactivate::{BulkDeactivateCommand, BulkDeactivateHandler};
pub use bulk_update::{BulkUpdateCommand, BulkUpdateHandler};
pub use cleanup_expired::{
    CleanupExpiredCommand, CleanupExpiredHandler, DEFAULT_CLEANUP_MIN_AGE_DAYS,
};
pub use emergency_toggle::{EmergencyToggleCommand, EmergencyToggleHandler};
pub use force_delete::{ForceDeleteCommand, ForceDeleteHandler, ForceDeleteResult};
pub use mark_usage_fraudulent::{MarkUsageFraudulentCommand, MarkUsageFraudulentHandler};
pub use override_limits::{OverrideLimitsCommand, OverrideLimitsHandler};
pub use reconcile_counter::{
    ReconcileCounterResult, ReconcileUsageCounterCommand, ReconcileUsageCounterHandler,
};
pub use system_promotion::{
    CreateSystemPromotionCommand, CreateSystemPromotionHandler, SystemPromotionResult,
    DEFAULT_PROMOTION_CODE_PREFIX,
};
pub use vendor_status::{
    RestoreVendorCommand, RestoreVendorHandler, SuspendVendorCommand, SuspendVendorHandler,
};

use tracing::error;

use crate::domain::foundation::CommandMetadata;
use crate::domain::voucher::{AdminAuditEntry, VoucherError};
use crate::ports::AdminAuditLog;

/// Largest id list a single bulk command accepts unless configured otherwise.
pub const DEFAULT_MAX_BULK_SIZE: usize = 500;

/// Returns the acting administrator's id.
fn require_admin(metadata: &CommandMetadata) -> Result<String, VoucherError> {
    let caller = metadata.caller()?;
    caller.require_admin()?;
    Ok(caller.id.clone())
}

/// Trims a mandatory reason and rejects it when blank.
fn require_reason(reason: &str) -> Result<String, VoucherError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(VoucherError::validation("reason", "a reason is required"));
    }
    Ok(trimmed.to_string())
}

fn check_batch_size(requested: usize, max: usize) -> Result<(), VoucherError> {
    if requested == 0 {
        return Err(VoucherError::validation("voucher_ids", "at least one id is required"));
    }
    if requested > max {
        return Err(VoucherError::validation(
            "voucher_ids",
            format!("at most {} ids per request, got {}", max, requested),
        ));
    }
    Ok(())
}

/// Appends an audit entry for a mutation that has already committed.
///
/// The mutation cannot be undone at this point, so a failed append is
/// logged at error level rather than returned.
async fn record_audit(audit: &dyn AdminAuditLog, entry: AdminAuditEntry) {
    if let Err(err) = audit.append(&entry).await {
        error!(
            action = %entry.action,
            actor_id = %entry.actor_id,
            error = %err,
            "failed to append admin audit entry"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, vendor_meta};

    #[test]
    fn vendors_are_not_admins() {
        assert!(matches!(
            require_admin(&vendor_meta("vendor-1")),
            Err(VoucherError::Unauthorized(_))
        ));
        assert_eq!(require_admin(&admin_meta()).unwrap(), "ops-1");
        assert_eq!(
            require_admin(&CommandMetadata::anonymous()).unwrap_err(),
            VoucherError::Unauthenticated
        );
    }

    #[test]
    fn blank_reason_is_rejected() {
        assert!(require_reason("   ").is_err());
        assert_eq!(require_reason("  chargeback ").unwrap(), "chargeback");
    }

    #[test]
    fn batch_bounds() {
        assert!(check_batch_size(0, 10).is_err());
        assert!(check_batch_size(10, 10).is_ok());
        assert!(check_batch_size(11, 10).is_err());
    }
}
