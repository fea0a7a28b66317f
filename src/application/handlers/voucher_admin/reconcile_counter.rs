//! ReconcileUsageCounterHandler - Rebuilds a voucher's usage counter.
//!
//! The counter is recomputed from the usage rows while the voucher row is
//! locked, so no redemption can change either side mid-count.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger};

use super::super::publish_best_effort;
use super::{record_audit, require_admin};

#[derive(Debug, Clone)]
pub struct ReconcileUsageCounterCommand {
    pub voucher_id: VoucherId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileCounterResult {
    pub voucher_id: VoucherId,
    pub previous: u32,
    pub current: u32,
}

impl ReconcileCounterResult {
    pub fn drifted(&self) -> bool {
        self.previous != self.current
    }
}

pub struct ReconcileUsageCounterHandler {
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ReconcileUsageCounterHandler {
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
        cmd: ReconcileUsageCounterCommand,
        metadata: CommandMetadata,
    ) -> Result<ReconcileCounterResult, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let now = Timestamp::now();

        let mut tx = self.ledger.begin().await?;
        let mut voucher = tx
            .lock_voucher(&cmd.voucher_id)
            .await?
            .ok_or_else(|| VoucherError::not_found(cmd.voucher_id))?;

        let actual = tx.count_usages(&voucher.id).await?;
        let actual = u32::try_from(actual).map_err(|_| {
            VoucherError::infrastructure(format!("usage count {} out of range", actual))
        })?;
        let previous = voucher.reconcile_count(actual, now);
        let result = ReconcileCounterResult {
            voucher_id: voucher.id,
            previous,
            current: actual,
        };

        if result.drifted() {
            tx.save_voucher(&voucher).await?;
            tx.commit().await?;
            warn!(
                voucher_id = %voucher.id,
                previous,
                current = actual,
                "usage counter drift corrected"
            );
        } else {
            tx.rollback().await?;
            info!(voucher_id = %voucher.id, count = actual, "usage counter consistent");
        }

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::ReconcileCounter, actor_id, now)
                .with_voucher(voucher.id)
                .with_vendor(voucher.vendor_id.clone())
                .with_affected(u64::from(result.drifted())),
        )
        .await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::CounterReconciled {
                voucher_id: voucher.id,
                previous,
                current: actual,
                occurred_at: now,
            },
        )
        .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, Fixture};
    use crate::ports::VoucherRepository;

    #[tokio::test]
    async fn corrects_drifted_counter() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let mut tx = fx.store.begin().await.unwrap();
        let mut locked = tx.lock_voucher(&voucher.id).await.unwrap().unwrap();
        locked.reconcile_count(4, Timestamp::now());
        tx.save_voucher(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let handler =
            ReconcileUsageCounterHandler::new(fx.store.clone(), fx.store.clone(), fx.bus.clone());
        let result = handler
            .handle(
                ReconcileUsageCounterCommand {
                    voucher_id: voucher.id,
                },
                admin_meta(),
            )
            .await
            .unwrap();

        assert_eq!(result.previous, 4);
        assert_eq!(result.current, 0);
        assert!(result.drifted());
        let stored = fx.store.find_by_id(&voucher.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage_count, 0);
        assert!(fx.bus.has_event("voucher.admin.counter_reconciled.v1"));
    }

    #[tokio::test]
    async fn consistent_counter_is_left_alone() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "SUMMER25").await;

        let handler =
            ReconcileUsageCounterHandler::new(fx.store.clone(), fx.store.clone(), fx.bus.clone());
        let result = handler
            .handle(
                ReconcileUsageCounterCommand {
                    voucher_id: voucher.id,
                },
                admin_meta(),
            )
            .await
            .unwrap();

        assert!(!result.drifted());
        let stored = fx.store.find_by_id(&voucher.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, voucher.updated_at);
    }
}
