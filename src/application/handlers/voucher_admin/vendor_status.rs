//! Vendor suspension and restoration.
//!
//! Suspension deactivates every voucher the vendor owns. Restoration
//! reactivates the ones that have not yet expired.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp, VendorId, VoucherId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger, VoucherRepository};

use super::super::publish_best_effort;
use super::{record_audit, require_admin, require_reason};

#[derive(Debug, Clone)]
pub struct SuspendVendorCommand {
    pub vendor_id: VendorId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RestoreVendorCommand {
    pub vendor_id: VendorId,
    pub reason: Option<String>,
}

/// Locks all of a vendor's vouchers and sets their active flag.
///
/// Returns the number of vouchers whose flag changed.
async fn set_vendor_vouchers_active(
    repository: &dyn VoucherRepository,
    ledger: &dyn UsageLedger,
    vendor_id: &VendorId,
    active: bool,
    now: Timestamp,
) -> Result<u64, VoucherError> {
    let ids: Vec<VoucherId> = repository
        .list_by_vendor(vendor_id)
        .await?
        .into_iter()
        .map(|v| v.id)
        .collect();
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = ledger.begin().await?;
    let vouchers = tx.lock_vouchers(&ids).await?;
    let mut affected = 0u64;
    for mut voucher in vouchers {
        // Ownership is re-checked on the locked row.
        if &voucher.vendor_id != vendor_id {
            continue;
        }
        if active && voucher.is_expired(&now) {
            continue;
        }
        if voucher.set_active(active, now) {
            tx.save_voucher(&voucher).await?;
            affected += 1;
        }
    }
    tx.commit().await?;
    Ok(affected)
}

pub struct SuspendVendorHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl SuspendVendorHandler {
    pub fn new(
        repository: Arc<dyn VoucherRepository>,
        ledger: Arc<dyn UsageLedger>,
        audit_log: Arc<dyn AdminAuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            ledger,
            audit_log,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: SuspendVendorCommand,
        metadata: CommandMetadata,
    ) -> Result<u64, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let reason = require_reason(&cmd.reason)?;
        let now = Timestamp::now();

        let affected = set_vendor_vouchers_active(
            self.repository.as_ref(),
            self.ledger.as_ref(),
            &cmd.vendor_id,
            false,
            now,
        )
        .await?;
        info!(vendor_id = %cmd.vendor_id, affected, reason = %reason, "vendor suspended");

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::SuspendVendor, actor_id, now)
                .with_vendor(cmd.vendor_id.clone())
                .with_reason(reason.clone())
                .with_affected(affected),
        )
        .await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::VendorSuspended {
                vendor_id: cmd.vendor_id,
                reason,
                affected,
                occurred_at: now,
            },
        )
        .await;

        Ok(affected)
    }
}

pub struct RestoreVendorHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl RestoreVendorHandler {
    pub fn new(
        repository: Arc<dyn VoucherRepository>,
        ledger: Arc<dyn UsageLedger>,
        audit_log: Arc<dyn AdminAuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            ledger,
            audit_log,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: RestoreVendorCommand,
        metadata: CommandMetadata,
    ) -> Result<u64, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let now = Timestamp::now();

        let affected = set_vendor_vouchers_active(
            self.repository.as_ref(),
            self.ledger.as_ref(),
            &cmd.vendor_id,
            true,
            now,
        )
        .await?;
        info!(vendor_id = %cmd.vendor_id, affected, "vendor restored");

        let mut entry = AdminAuditEntry::new(AdminAction::RestoreVendor, actor_id, now)
            .with_vendor(cmd.vendor_id.clone())
            .with_affected(affected);
        if let Some(reason) = cmd.reason {
            entry = entry.with_reason(reason);
        }
        record_audit(self.audit_log.as_ref(), entry).await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::VendorRestored {
                vendor_id: cmd.vendor_id,
                affected,
                occurred_at: now,
            },
        )
        .await;

        Ok(affected)
    }
}
