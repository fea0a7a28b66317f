//! CreateVoucherHandler - Command handler for creating vouchers.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, Timestamp};
use crate::domain::voucher::{Voucher, VoucherDraft, VoucherError, VoucherEvent};
use crate::ports::{EventPublisher, VoucherRepository};

use super::super::publish_best_effort;

/// Command to create a voucher for the calling vendor.
#[derive(Debug, Clone)]
pub struct CreateVoucherCommand {
    pub draft: VoucherDraft,
}

/// Handler for creating vouchers.
pub struct CreateVoucherHandler {
    repository: Arc<dyn VoucherRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl CreateVoucherHandler {
    pub fn new(
        repository: Arc<dyn VoucherRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateVoucherCommand,
        metadata: CommandMetadata,
    ) -> Result<Voucher, VoucherError> {
        // 1. Only vendors own vouchers
        let vendor_id = metadata.caller()?.require_vendor()?;

        // 2. Build and validate the aggregate
        let voucher = Voucher::create(vendor_id, cmd.draft, Timestamp::now())?;

        // 3. Per-vendor code uniqueness (the insert re-checks atomically)
        if self
            .repository
            .code_exists(&voucher.vendor_id, &voucher.coupon_code, None)
            .await?
        {
            return Err(VoucherError::duplicate_code(voucher.coupon_code.as_str()));
        }

        // 4. Persist
        self.repository.insert(&voucher).await?;
        info!(
            voucher_id = %voucher.id,
            vendor_id = %voucher.vendor_id,
            coupon_code = %voucher.coupon_code,
            "voucher created"
        );

        // 5. Publish event
        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::Created {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id.clone(),
                coupon_code: voucher.coupon_code.clone(),
                occurred_at: voucher.created_at,
            },
        )
        .await;

        Ok(voucher)
    }
}
