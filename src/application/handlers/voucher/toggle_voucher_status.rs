//! ToggleVoucherStatusHandler - Flips a voucher's active flag.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, OwnedByVendor, Timestamp, VoucherId};
use crate::domain::voucher::{Voucher, VoucherError, VoucherEvent};
use crate::ports::{EventPublisher, UsageLedger};

use super::super::publish_best_effort;

#[derive(Debug, Clone)]
pub struct ToggleVoucherStatusCommand {
    pub voucher_id: VoucherId,
}

pub struct ToggleVoucherStatusHandler {
    ledger: Arc<dyn UsageLedger>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ToggleVoucherStatusHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    /// Flips `is_active` and returns the voucher. Usage counters and the
    /// validity window are left alone.
    pub async fn handle(
        &self,
        cmd: ToggleVoucherStatusCommand,
        metadata: CommandMetadata,
    ) -> Result<Voucher, VoucherError> {
        let caller = metadata.caller()?;

        let mut tx = self.ledger.begin().await?;
        let mut voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;
        voucher.check_access(caller)?;

        let is_active = voucher.toggle_active(Timestamp::now());
        tx.save_voucher(&voucher).await?;
        tx.commit().await?;
        info!(voucher_id = %voucher.id, is_active, "voucher status toggled");

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::StatusToggled {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id.clone(),
                is_active,
                occurred_at: voucher.updated_at,
            },
        )
        .await;

        Ok(voucher)
    }
}
