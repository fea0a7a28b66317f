//! BulkUpdateHandler - Applies one change set to many vouchers.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{
    AdminAction, AdminAuditEntry, Voucher, VoucherChanges, VoucherError, VoucherEvent,
};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{check_batch_size, record_audit, require_admin, DEFAULT_MAX_BULK_SIZE};

#[derive(Debug, Clone)]
pub struct BulkUpdateCommand {
    pub voucher_ids: Vec<VoucherId>,
    /// Applied to each voucher. Coupon codes cannot be bulk-assigned.
    pub changes: VoucherChanges,
    pub reason: Option<String>,
}

/// All listed vouchers are locked and updated in one transaction; if any
/// of them rejects the changes, none is modified. Unknown ids are skipped.
pub struct BulkUpdateHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
    max_bulk_size: usize,
}

impl BulkUpdateHandler {
    pub fn new(
        ledger: Arc<dyn UsageLedger>,
        audit_log: Arc<dyn AdminAuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            audit_log,
            event_publisher,
            max_bulk_size: DEFAULT_MAX_BULK_SIZE,
        }
    }

    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.max_bulk_size = max_bulk_size;
        self
    }

    pub async fn handle(
        &self,
        cmd: BulkUpdateCommand,
        metadata: CommandMetadata,
    ) -> Result<Vec<Voucher>, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        check_batch_size(cmd.voucher_ids.len(), self.max_bulk_size)?;
        if cmd.changes.coupon_code.is_some() {
            return Err(VoucherError::validation(
                "coupon_code",
                "coupon codes cannot be changed in bulk",
            ));
        }

        let now = Timestamp::now();
        let mut tx = self.ledger.begin().await?;
        let mut vouchers = tx.lock_vouchers(&cmd.voucher_ids).await?;
        for voucher in &mut vouchers {
            voucher.apply_changes(cmd.changes.clone(), now)?;
        }
        for voucher in &vouchers {
            tx.save_voucher(voucher).await?;
        }
        tx.commit().await?;

        let voucher_ids: Vec<VoucherId> = vouchers.iter().map(|v| v.id).collect();
        info!(
            actor_id = %actor_id,
            requested = cmd.voucher_ids.len(),
            updated = voucher_ids.len(),
            "vouchers bulk updated"
        );

        let mut entry = AdminAuditEntry::new(AdminAction::BulkUpdate, actor_id, now)
            .with_affected(voucher_ids.len() as u64);
        if let Some(reason) = cmd.reason {
            entry = entry.with_reason(reason);
        }
        record_audit(self.audit_log.as_ref(), entry).await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::BulkUpdated {
                voucher_ids,
                occurred_at: now,
            },
        )
        .await;

        Ok(vouchers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, vendor_meta, Fixture};
    use crate::domain::foundation::Money;
    use crate::ports::VoucherRepository;

    fn handler(fx: &Fixture) -> BulkUpdateHandler {
        BulkUpdateHandler::new(fx.store.clone(), fx.store.clone(), fx.bus.clone())
    }

    #[tokio::test]
    async fn updates_vouchers_across_vendors() {
        let fx = Fixture::new();
        let a = fx.seed_default("vendor-1", "SUMMER25").await;
        let b = fx.seed_default("vendor-2", "SUMMER25").await;

        let cmd = BulkUpdateCommand {
            voucher_ids: vec![a.id, b.id, VoucherId::new()],
            changes: VoucherChanges {
                min_order_value: Some(Some(Money::from_cents(2_000))),
                ..Default::default()
            },
            reason: Some("raise minimums".to_string()),
        };
        let updated = handler(&fx).handle(cmd, admin_meta()).await.unwrap();

        assert_eq!(updated.len(), 2);
        for id in [a.id, b.id] {
            let stored = fx.store.find_by_id(&id).await.unwrap().unwrap();
            assert_eq!(stored.min_order_value, Some(Money::from_cents(2_000)));
        }

        let events = fx.bus.events_of_type("voucher.admin.bulk_updated.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.actor.as_deref(), Some("ADMIN"));

        let audit = fx.store.list_recent(10).await.unwrap();
        assert_eq!(audit[0].action, AdminAction::BulkUpdate);
        assert_eq!(audit[0].affected, 2);
        assert_eq!(audit[0].reason.as_deref(), Some("raise minimums"));
    }

    #[tokio::test]
    async fn one_invalid_voucher_aborts_the_batch() {
        let fx = Fixture::new();
        let a = fx.seed_default("vendor-1", "SUMMER25").await;
        let b = fx.seed_default("vendor-1", "WINTER10").await;

        let cmd = BulkUpdateCommand {
            voucher_ids: vec![a.id, b.id],
            changes: VoucherChanges {
                valid_until: Some(a.validity.valid_from()),
                ..Default::default()
            },
            reason: None,
        };
        let result = handler(&fx).handle(cmd, admin_meta()).await;

        assert_eq!(result.unwrap_err(), VoucherError::InvalidDateRange);
        let stored = fx.store.find_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.validity, a.validity);
        assert_eq!(fx.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn rejects_bulk_code_change() {
        let fx = Fixture::new();
        let a = fx.seed_default("vendor-1", "SUMMER25").await;

        let cmd = BulkUpdateCommand {
            voucher_ids: vec![a.id],
            changes: VoucherChanges {
                coupon_code: Some("NEWCODE1".to_string()),
                ..Default::default()
            },
            reason: None,
        };
        let result = handler(&fx).handle(cmd, admin_meta()).await;
        assert!(matches!(result, Err(VoucherError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn enforces_batch_limit() {
        let fx = Fixture::new();
        let handler = handler(&fx).with_max_bulk_size(2);

        let cmd = BulkUpdateCommand {
            voucher_ids: vec![VoucherId::new(), VoucherId::new(), VoucherId::new()],
            changes: VoucherChanges::default(),
            reason: None,
        };
        assert!(handler.handle(cmd, admin_meta()).await.is_err());
    }

    #[tokio::test]
    async fn vendors_cannot_bulk_update() {
        let fx = Fixture::new();
        let a = fx.seed_default("vendor-1", "SUMMER25").await;

        let cmd = BulkUpdateCommand {
            voucher_ids: vec![a.id],
            changes: VoucherChanges::default(),
            reason: None,
        };
        let result = handler(&fx).handle(cmd, vendor_meta("vendor-1")).await;
        assert!(matches!(result, Err(VoucherError::Unauthorized(_))));
    }
}
