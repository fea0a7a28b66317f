//! UpdateVoucherHandler - Command handler for editing voucher definitions.
//!
//! The edit runs under the voucher row lock so it cannot interleave with a
//! redemption that is reading the same limits.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, OwnedByVendor, Timestamp, VoucherId};
use crate::domain::voucher::{Voucher, VoucherChanges, VoucherError, VoucherEvent};
use crate::ports::{EventPublisher, UsageLedger, VoucherRepository};

use super::super::publish_best_effort;

/// Command to update a voucher.
#[derive(Debug, Clone)]
pub struct UpdateVoucherCommand {
    pub voucher_id: VoucherId,
    pub changes: VoucherChanges,
}

/// Handler for updating vouchers.
pub struct UpdateVoucherHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl UpdateVoucherHandler {
    pub fn new(
        repository: Arc<dyn VoucherRepository>,
        ledger: Arc<dyn UsageLedger>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            ledger,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: UpdateVoucherCommand,
        metadata: CommandMetadata,
    ) -> Result<Voucher, VoucherError> {
        let caller = metadata.caller()?;

        let mut tx = self.ledger.begin().await?;
        let mut voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;
        voucher.check_access(caller)?;

        let code_changed = voucher.apply_changes(cmd.changes, Timestamp::now())?;
        if code_changed
            && self
                .repository
                .code_exists(&voucher.vendor_id, &voucher.coupon_code, Some(&voucher.id))
                .await?
        {
            return Err(VoucherError::duplicate_code(voucher.coupon_code.as_str()));
        }

        tx.save_voucher(&voucher).await?;
        tx.commit().await?;
        info!(voucher_id = %voucher.id, code_changed, "voucher updated");

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::Updated {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id.clone(),
                occurred_at: voucher.updated_at,
            },
        )
        .await;

        Ok(voucher)
    }
}
