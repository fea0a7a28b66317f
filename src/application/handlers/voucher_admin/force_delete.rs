//! ForceDeleteHandler - Deletes a voucher regardless of its usage history.
//!
//! The usage rows and fraud flags are removed with the voucher. Before
//! anything is deleted, the voucher and every usage row are archived as a
//! JSON snapshot in the audit entry; if that append fails, nothing is
//! deleted.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{
    AdminAction, AdminAuditEntry, Voucher, VoucherError, VoucherEvent, VoucherUsage,
};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{require_admin, require_reason};

#[derive(Debug, Clone)]
pub struct ForceDeleteCommand {
    pub voucher_id: VoucherId,
    pub reason: String,
}

/// Archived form of a force-deleted voucher.
#[derive(Serialize)]
struct Archive<'a> {
    voucher: &'a Voucher,
    usages: &'a [VoucherUsage],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForceDeleteResult {
    pub voucher_id: VoucherId,
    pub usages_removed: u64,
}

pub struct ForceDeleteHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ForceDeleteHandler {
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
        cmd: ForceDeleteCommand,
        metadata: CommandMetadata,
    ) -> Result<ForceDeleteResult, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let reason = require_reason(&cmd.reason)?;
        let now = Timestamp::now();

        let mut tx = self.ledger.begin().await?;
        let voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;
        let usages = tx.list_usages(&voucher.id).await?;

        // Archive first. The append is not part of the ledger transaction.
        let snapshot = serde_json::to_value(Archive {
            voucher: &voucher,
            usages: &usages,
        })
        .map_err(|e| VoucherError::infrastructure(format!("failed to archive voucher: {}", e)))?;
        let entry = AdminAuditEntry::new(AdminAction::ForceDelete, actor_id, now)
            .with_voucher(voucher.id)
            .with_vendor(voucher.vendor_id.clone())
            .with_reason(reason.clone())
            .with_affected(usages.len() as u64)
            .with_snapshot(snapshot);
        self.audit_log.append(&entry).await?;

        let usages_removed = tx.delete_voucher(&voucher.id).await?;
        if let Err(err) = tx.commit().await {
            warn!(
                voucher_id = %voucher.id,
                audit_entry = %entry.id,
                error = %err,
                "force delete archived but not committed"
            );
            return Err(err.into());
        }

        info!(
            voucher_id = %voucher.id,
            vendor_id = %voucher.vendor_id,
            usages_removed,
            reason = %reason,
            "voucher force deleted"
        );

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::ForceDeleted {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id,
                reason,
                usages_removed,
                occurred_at: now,
            },
        )
        .await;

        Ok(ForceDeleteResult {
            voucher_id: cmd.voucher_id,
            usages_removed,
        })
    }
}
