//! MarkUsageFraudulentHandler - Flags a redemption as suspected fraud.
//!
//! The flag sits beside the usage row. It does not reverse the discount or
//! release capacity.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherUsageId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, FraudFlag, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{record_audit, require_admin, require_reason};

#[derive(Debug, Clone)]
pub struct MarkUsageFraudulentCommand {
    pub usage_id: VoucherUsageId,
    pub reason: String,
}

pub struct MarkUsageFraudulentHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl MarkUsageFraudulentHandler {
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

    /// Flags the usage. Flagging an already flagged usage replaces the flag.
    pub async fn handle(
        &self,
        cmd: MarkUsageFraudulentCommand,
        metadata: CommandMetadata,
    ) -> Result<FraudFlag, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let reason = require_reason(&cmd.reason)?;

        let usage = self
            .ledger
            .find_usage(&cmd.usage_id)
            .await?
            .ok_or_else(|| VoucherError::usage_not_found(cmd.usage_id))?;

        let flag = FraudFlag {
            usage_id: usage.id,
            voucher_id: usage.voucher_id,
            reason: reason.clone(),
            flagged_by: actor_id.clone(),
            flagged_at: Timestamp::now(),
        };
        self.ledger.flag_usage(&flag).await?;
        info!(usage_id = %usage.id, voucher_id = %usage.voucher_id, "usage flagged as fraudulent");

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::MarkFraudulent, actor_id, flag.flagged_at)
                .with_voucher(usage.voucher_id)
                .with_usage(usage.id)
                .with_reason(reason.clone())
                .with_affected(1),
        )
        .await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::UsageFlagged {
                voucher_id: usage.voucher_id,
                usage_id: usage.id,
                reason,
                occurred_at: flag.flagged_at,
            },
        )
        .await;

        Ok(flag)
    }
}
