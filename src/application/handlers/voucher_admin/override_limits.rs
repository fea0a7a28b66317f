//! OverrideLimitsHandler - Administrative limit and expiry override.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{
    AdminAction, AdminAuditEntry, LimitOverride, Voucher, VoucherError, VoucherEvent,
};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{record_audit, require_admin};

#[derive(Debug, Clone)]
pub struct OverrideLimitsCommand {
    pub voucher_id: VoucherId,
    pub overrides: LimitOverride,
    pub reason: Option<String>,
}

pub struct OverrideLimitsHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl OverrideLimitsHandler {
    pub fn new(
        ledger: Arc<dyn UsageLedger>,
        audit_log: Arc<dyn AdminAuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            audit_log,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: OverrideLimitsCommand,
        metadata: CommandMetadata,
    ) -> Result<Voucher, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let now = Timestamp::now();

        let mut tx = self.ledger.begin().await?;
        let mut voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;
        voucher.override_limits(cmd.overrides, now)?;
        tx.save_voucher(&voucher).await?;
        tx.commit().await?;

        info!(
            voucher_id = %voucher.id,
            total_usage_limit = ?voucher.limits.total(),
            usage_per_user = voucher.limits.per_user(),
            valid_until = %voucher.validity.valid_until(),
            "voucher limits overridden"
        );

        let mut entry = AdminAuditEntry::new(AdminAction::OverrideLimits, actor_id, now)
            .with_voucher(voucher.id)
            .with_vendor(voucher.vendor_id.clone())
            .with_affected(1);
        if let Some(reason) = cmd.reason {
            entry = entry.with_reason(reason);
        }
        record_audit(self.audit_log.as_ref(), entry).await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::LimitsOverridden {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id.clone(),
                occurred_at: now,
            },
        )
        .await;

        Ok(voucher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, vendor_meta, Fixture};
    use crate::domain::foundation::Money;
    use crate::domain::voucher::{test_support, ExpiryOverride, NO_EXPIRY_DAYS};

    fn handler(fx: &Fixture) -> OverrideLimitsHandler {
        OverrideLimitsHandler::new(fx.store.clone(), fx.store.clone(), fx.bus.clone())
    }

    #[tokio::test]
    async fn raises_limits_and_extends_expiry() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;
        let new_end = voucher.validity.valid_until().add_days(60);

        let cmd = OverrideLimitsCommand {
            voucher_id: voucher.id,
            overrides: LimitOverride {
                total_usage_limit: Some(Some(1_000)),
                usage_per_user: Some(3),
                max_discount_amount: Some(Some(Money::from_cents(5_000))),
                expiry: Some(ExpiryOverride::ExtendTo(new_end)),
            },
            reason: Some("partner campaign".to_string()),
        };
        let updated = handler(&fx).handle(cmd, admin_meta()).await.unwrap();

        assert_eq!(updated.limits.total(), Some(1_000));
        assert_eq!(updated.limits.per_user(), 3);
        assert_eq!(updated.discount.max_discount(), Some(Money::from_cents(5_000)));
        assert_eq!(updated.validity.valid_until(), new_end);

        let audit = fx.store.list_for_voucher(&voucher.id).await.unwrap();
        assert_eq!(audit[0].action, AdminAction::OverrideLimits);
        assert!(fx.bus.has_event("voucher.admin.limits_overridden.v1"));
    }

    #[tokio::test]
    async fn remove_expiry_pushes_end_far_out() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let cmd = OverrideLimitsCommand {
            voucher_id: voucher.id,
            overrides: LimitOverride {
                expiry: Some(ExpiryOverride::Remove),
                ..Default::default()
            },
            reason: None,
        };
        let updated = handler(&fx).handle(cmd, admin_meta()).await.unwrap();

        assert_eq!(
            updated.validity.valid_until(),
            voucher.validity.valid_from().add_days(NO_EXPIRY_DAYS)
        );
    }

    #[tokio::test]
    async fn cannot_lower_total_below_usage() {
        let fx = Fixture::new();
        let mut draft = test_support::draft("SUMMER25");
        draft.total_usage_limit = Some(10);
        let voucher = fx.seed("vendor-1", draft).await;

        let mut tx = fx.store.begin().await.unwrap();
        let mut locked = tx.lock_voucher(&voucher.id).await.unwrap().unwrap();
        locked.reconcile_count(3, Timestamp::now());
        tx.save_voucher(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let cmd = OverrideLimitsCommand {
            voucher_id: voucher.id,
            overrides: LimitOverride {
                total_usage_limit: Some(Some(2)),
                ..Default::default()
            },
            reason: None,
        };
        let result = handler(&fx).handle(cmd, admin_meta()).await;
        assert!(matches!(result, Err(VoucherError::InvalidUsageLimit(_))));
    }

    #[tokio::test]
    async fn vendor_cannot_override() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let cmd = OverrideLimitsCommand {
            voucher_id: voucher.id,
            overrides: LimitOverride::default(),
            reason: None,
        };
        let result = handler(&fx).handle(cmd, vendor_meta("vendor-1")).await;
        assert!(matches!(result, Err(VoucherError::Unauthorized(_))));
    }
}
