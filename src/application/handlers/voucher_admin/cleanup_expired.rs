//! CleanupExpiredHandler - Sweeps expired, never-used vouchers.
//!
//! Ordinary delete semantics apply: a voucher with any usage row is never
//! swept, however old. Candidates are re-checked under the row lock and
//! deleted one chunk per transaction.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger, VoucherRepository};

use super::super::publish_best_effort;
use super::{record_audit, require_admin, DEFAULT_MAX_BULK_SIZE};

/// Vouchers must have been expired at least this long to be swept.
pub const DEFAULT_CLEANUP_MIN_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct CleanupExpiredCommand {
    /// Overrides the configured minimum age, in days since expiry.
    pub min_age_days: Option<i64>,
}

pub struct CleanupExpiredHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
    min_age_days: i64,
    batch_size: usize,
}

impl CleanupExpiredHandler {
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
            min_age_days: DEFAULT_CLEANUP_MIN_AGE_DAYS,
            batch_size: DEFAULT_MAX_BULK_SIZE,
        }
    }

    pub fn with_min_age_days(mut self, days: i64) -> Self {
        self.min_age_days = days;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the ids of the deleted vouchers.
    ///
    /// When a chunk fails, the vouchers deleted by earlier chunks are still
    /// audited and announced before the error is returned.
    pub async fn handle(
        &self,
        cmd: CleanupExpiredCommand,
        metadata: CommandMetadata,
    ) -> Result<Vec<VoucherId>, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let min_age_days = cmd.min_age_days.unwrap_or(self.min_age_days);
        if min_age_days < 0 {
            return Err(VoucherError::validation(
                "min_age_days",
                "minimum age cannot be negative",
            ));
        }

        let now = Timestamp::now();
        let cutoff = now.minus_days(min_age_days);
        let mut candidates: Vec<VoucherId> = self
            .repository
            .list_expired_before(cutoff)
            .await?
            .into_iter()
            .filter(|v| v.current_usage_count == 0)
            .map(|v| v.id)
            .collect();
        candidates.sort();
        debug!(candidates = candidates.len(), cutoff = %cutoff, "expired voucher sweep");

        let mut deleted = Vec::new();
        let outcome = self.sweep(&candidates, cutoff, &mut deleted).await;

        match &outcome {
            Ok(()) => info!(deleted = deleted.len(), min_age_days, "expired vouchers cleaned up"),
            Err(err) => warn!(
                deleted = deleted.len(),
                error = %err,
                "expired voucher sweep stopped part way"
            ),
        }

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::CleanupExpired, actor_id, now)
                .with_affected(deleted.len() as u64),
        )
        .await;

        if !deleted.is_empty() {
            publish_best_effort(
                self.event_publisher.as_ref(),
                &metadata,
                VoucherEvent::ExpiredCleanedUp {
                    voucher_ids: deleted.clone(),
                    occurred_at: now,
                },
            )
            .await;
        }

        outcome.map(|()| deleted)
    }

    /// `deleted` only receives ids whose chunk committed.
    async fn sweep(
        &self,
        candidates: &[VoucherId],
        cutoff: Timestamp,
        deleted: &mut Vec<VoucherId>,
    ) -> Result<(), VoucherError> {
        for chunk in candidates.chunks(self.batch_size) {
            let mut tx = self.ledger.begin().await?;
            let mut swept = Vec::new();
            for voucher in tx.lock_vouchers(chunk).await? {
                if !voucher.validity.valid_until().is_before(&cutoff) {
                    continue;
                }
                if tx.count_usages(&voucher.id).await? > 0 {
                    continue;
                }
                tx.delete_voucher(&voucher.id).await?;
                swept.push(voucher.id);
            }
            tx.commit().await?;
            deleted.extend(swept);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, user_id, Fixture};
    use crate::domain::foundation::{BookingId, Money, ServiceId};
    use crate::domain::voucher::{calculate_discount, test_support, ServiceType, VoucherUsage};
    use std::time::Duration;

    fn expired_draft(code: &str, ended_days_ago: i64) -> crate::domain::voucher::VoucherDraft {
        let mut draft = test_support::draft(code);
        draft.valid_from = Timestamp::now().minus_days(ended_days_ago + 30);
        draft.valid_until = Timestamp::now().minus_days(ended_days_ago);
        draft
    }

    fn handler(fx: &Fixture) -> CleanupExpiredHandler {
        CleanupExpiredHandler::new(
            fx.store.clone(),
            fx.store.clone(),
            fx.store.clone(),
            fx.bus.clone(),
        )
    }

    #[tokio::test]
    async fn sweeps_only_old_unused_vouchers() {
        let fx = Fixture::new();
        let old_unused = fx.seed("vendor-1", expired_draft("OLDUNUSED", 60)).await;
        let old_used = fx.seed("vendor-1", expired_draft("OLDUSED", 60)).await;
        let recent = fx.seed("vendor-1", expired_draft("RECENT", 5)).await;
        let live = fx.seed_default("vendor-1", "LIVE2024").await;

        let mut tx = fx.store.begin().await.unwrap();
        tx.lock_voucher(&old_used.id).await.unwrap();
        tx.record_usage(&VoucherUsage::record(
            old_used.id,
            user_id("user-1"),
            BookingId::new("booking-1").unwrap(),
            ServiceType::new("spa").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            calculate_discount(
                old_used.discount.kind(),
                old_used.discount.value(),
                Money::from_cents(10_000),
                None,
            ),
            Timestamp::now().minus_days(70),
        ))
        .await
        .unwrap();
        tx.increment_usage_counter(&old_used.id).await.unwrap();
        tx.commit().await.unwrap();

        let deleted = handler(&fx)
            .handle(CleanupExpiredCommand::default(), admin_meta())
            .await
            .unwrap();

        assert_eq!(deleted, vec![old_unused.id]);
        for kept in [&old_used, &recent, &live] {
            assert!(fx.store.find_by_id(&kept.id).await.unwrap().is_some());
        }
        assert!(fx.bus.has_event("voucher.admin.expired_cleaned_up.v1"));
    }

    #[tokio::test]
    async fn min_age_override_widens_sweep() {
        let fx = Fixture::new();
        let recent = fx.seed("vendor-1", expired_draft("RECENT", 5)).await;

        let deleted = handler(&fx)
            .handle(
                CleanupExpiredCommand {
                    min_age_days: Some(1),
                },
                admin_meta(),
            )
            .await
            .unwrap();

        assert_eq!(deleted, vec![recent.id]);
    }

    #[tokio::test]
    async fn empty_sweep_publishes_nothing() {
        let fx = Fixture::new();
        fx.seed_default("vendor-1", "LIVE2024").await;

        let deleted = handler(&fx)
            .with_batch_size(1)
            .handle(CleanupExpiredCommand::default(), admin_meta())
            .await
            .unwrap();

        assert!(deleted.is_empty());
        assert_eq!(fx.bus.event_count(), 0);
        assert_eq!(fx.store.list_recent(1).await.unwrap()[0].affected, 0);
    }

    #[tokio::test]
    async fn failed_chunk_still_audits_committed_deletions() {
        let fx = Fixture::with_lock_timeout(Duration::from_millis(50));
        let a = fx.seed("vendor-1", expired_draft("OLDAAAA", 60)).await;
        let b = fx.seed("vendor-1", expired_draft("OLDBBBB", 60)).await;
        let (first, second) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };

        let mut blocker = fx.store.begin().await.unwrap();
        blocker.lock_voucher(&second).await.unwrap();

        let result = handler(&fx)
            .with_batch_size(1)
            .handle(CleanupExpiredCommand::default(), admin_meta())
            .await;
        drop(blocker);

        assert!(matches!(result, Err(VoucherError::Infrastructure(_))));
        assert!(fx.store.find_by_id(&first).await.unwrap().is_none());
        assert!(fx.store.find_by_id(&second).await.unwrap().is_some());

        let audit = fx.store.list_recent(10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AdminAction::CleanupExpired);
        assert_eq!(audit[0].affected, 1);

        let events = fx.bus.events_of_type("voucher.admin.expired_cleaned_up.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["voucher_ids"][0], first.to_string());
    }
}
