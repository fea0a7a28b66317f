//! BulkDeactivateHandler - Deactivates many vouchers with a recorded reason.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{check_batch_size, record_audit, require_admin, require_reason, DEFAULT_MAX_BULK_SIZE};

#[derive(Debug, Clone)]
pub struct BulkDeactivateCommand {
    pub voucher_ids: Vec<VoucherId>,
    pub reason: String,
}

pub struct BulkDeactivateHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
    max_bulk_size: usize,
}

impl BulkDeactivateHandler {
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

    /// Returns the number of vouchers that were active and are now inactive.
    pub async fn handle(
        &self,
        cmd: BulkDeactivateCommand,
        metadata: CommandMetadata,
    ) -> Result<u64, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let reason = require_reason(&cmd.reason)?;
        check_batch_size(cmd.voucher_ids.len(), self.max_bulk_size)?;

        let now = Timestamp::now();
        let mut tx = self.ledger.begin().await?;
        let vouchers = tx.lock_vouchers(&cmd.voucher_ids).await?;

        let mut deactivated = Vec::new();
        for mut voucher in vouchers {
            if voucher.set_active(false, now) {
                tx.save_voucher(&voucher).await?;
                deactivated.push(voucher.id);
            }
        }
        tx.commit().await?;

        let affected = deactivated.len() as u64;
        info!(actor_id = %actor_id, affected, reason = %reason, "vouchers bulk deactivated");

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::BulkDeactivate, actor_id, now)
                .with_reason(reason.clone())
                .with_affected(affected),
        )
        .await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::BulkDeactivated {
                voucher_ids: deactivated,
                reason,
                occurred_at: now,
            },
        )
        .await;

        Ok(affected)
    }
}
