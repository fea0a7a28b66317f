//! DeleteVoucherHandler - Command handler for deleting unused vouchers.

use std::sync::Arc;
use tracing::info;

use crate::domain::foundation::{CommandMetadata, OwnedByVendor, Timestamp, VoucherId};
use crate::domain::voucher::{VoucherError, VoucherEvent};
use crate::ports::{EventPublisher, UsageLedger};

use super::super::publish_best_effort;

/// Command to delete a voucher that has never been redeemed.
#[derive(Debug, Clone)]
pub struct DeleteVoucherCommand {
    pub voucher_id: VoucherId,
}

/// Handler for deleting vouchers.
///
/// The usage check and the delete happen under the row lock, so a
/// redemption cannot slip in between them.
pub struct DeleteVoucherHandler {
    ledger: Arc<dyn UsageLedger>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl DeleteVoucherHandler {
    pub fn new(ledger: Arc<dyn UsageLedger>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: DeleteVoucherCommand,
        metadata: CommandMetadata,
    ) -> Result<(), VoucherError> {
        let caller = metadata.caller()?;

        let mut tx = self.ledger.begin().await?;
        let voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;
        voucher.check_access(caller)?;

        let usage_count = tx.count_usages(&voucher.id).await?;
        if usage_count > 0 {
            return Err(VoucherError::CannotDeleteUsedVoucher {
                voucher_id: voucher.id.to_string(),
                usage_count,
            });
        }

        tx.delete_voucher(&voucher.id).await?;
        tx.commit().await?;
        info!(voucher_id = %voucher.id, vendor_id = %voucher.vendor_id, "voucher deleted");

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::Deleted {
                voucher_id: voucher.id,
                vendor_id: voucher.vendor_id,
                coupon_code: voucher.coupon_code,
                occurred_at: Timestamp::now(),
            },
        )
        .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{user_id, vendor_meta, Fixture};
    use crate::domain::foundation::{BookingId, Money, ServiceId};
    use crate::domain::voucher::{calculate_discount, ServiceType, VoucherUsage};
    use crate::ports::VoucherRepository;

    fn handler(fx: &Fixture) -> DeleteVoucherHandler {
        DeleteVoucherHandler::new(fx.store.clone(), fx.bus.clone())
    }

    #[tokio::test]
    async fn deletes_unused_voucher() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        handler(&fx)
            .handle(
                DeleteVoucherCommand {
                    voucher_id: voucher.id,
                },
                vendor_meta("vendor-1"),
            )
            .await
            .unwrap();

        assert!(fx.store.find_by_id(&voucher.id).await.unwrap().is_none());
        assert!(fx.bus.has_event("voucher.deleted.v1"));
    }

    #[tokio::test]
    async fn refuses_to_delete_used_voucher() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let mut tx = fx.store.begin().await.unwrap();
        tx.lock_voucher(&voucher.id).await.unwrap();
        let usage = VoucherUsage::record(
            voucher.id,
            user_id("user-1"),
            BookingId::new("booking-1").unwrap(),
            ServiceType::new("spa").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            calculate_discount(
                voucher.discount.kind(),
                voucher.discount.value(),
                Money::from_cents(10_000),
                None,
            ),
            Timestamp::now(),
        );
        tx.record_usage(&usage).await.unwrap();
        tx.increment_usage_counter(&voucher.id).await.unwrap();
        tx.commit().await.unwrap();

        let result = handler(&fx)
            .handle(
                DeleteVoucherCommand {
                    voucher_id: voucher.id,
                },
                vendor_meta("vendor-1"),
            )
            .await;

        assert!(matches!(
            result,
            Err(VoucherError::CannotDeleteUsedVoucher { usage_count: 1, .. })
        ));
        assert!(fx.store.find_by_id(&voucher.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn foreign_vendor_cannot_delete() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let result = handler(&fx)
            .handle(
                DeleteVoucherCommand {
                    voucher_id: voucher.id,
                },
                vendor_meta("vendor-2"),
            )
            .await;

        assert!(matches!(result, Err(VoucherError::Unauthorized(_))));
        assert!(fx.store.find_by_id(&voucher.id).await.unwrap().is_some());
    }
}
