//! EmergencyToggleHandler - Global kill switch for incident response.
//!
//! Disabling deactivates every voucher in the system; enabling reactivates
//! every voucher that has not expired. Vouchers are processed in chunks,
//! each under its own ledger transaction, so the switch never holds more
//! than one chunk of row locks at a time. Vouchers created after the id
//! list is read are not touched.
//!
//! The switch keeps no memory of why a voucher was inactive. Re-enabling
//! also reactivates vouchers a vendor had switched off and vouchers of a
//! suspended vendor; run `SuspendVendor` again after re-enabling to put a
//! suspension back in force.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::foundation::{CommandMetadata, Timestamp, VoucherId};
use crate::domain::voucher::{AdminAction, AdminAuditEntry, VoucherError, VoucherEvent};
use crate::ports::{AdminAuditLog, EventPublisher, UsageLedger, VoucherRepository};

use super::super::publish_best_effort;
use super::{record_audit, require_admin, require_reason, DEFAULT_MAX_BULK_SIZE};

#[derive(Debug, Clone)]
pub struct EmergencyToggleCommand {
    /// `false` disables every voucher, `true` re-enables them.
    pub enabled: bool,
    pub reason: String,
}

pub struct EmergencyToggleHandler {
    repository: Arc<dyn VoucherRepository>,
    ledger: Arc<dyn UsageLedger>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
    chunk_size: usize,
}

impl EmergencyToggleHandler {
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
            chunk_size: DEFAULT_MAX_BULK_SIZE,
        }
    }

    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.chunk_size = max_bulk_size.max(1);
        self
    }

    /// Returns the number of vouchers whose active flag changed.
    ///
    /// A chunk that fails leaves earlier chunks committed. The audit entry
    /// and event still go out, carrying the committed count, before the
    /// error is returned. Re-running the command is safe since unchanged
    /// vouchers are skipped.
    pub async fn handle(
        &self,
        cmd: EmergencyToggleCommand,
        metadata: CommandMetadata,
    ) -> Result<u64, VoucherError> {
        let actor_id = require_admin(&metadata)?;
        let reason = require_reason(&cmd.reason)?;
        let now = Timestamp::now();

        let ids = self.repository.list_all_ids().await?;
        let mut affected = 0u64;
        let outcome = self
            .toggle_chunks(&ids, cmd.enabled, now, &mut affected)
            .await;

        match &outcome {
            Ok(()) => {
                info!(enabled = cmd.enabled, affected, reason = %reason, "emergency toggle applied")
            }
            Err(err) => warn!(
                enabled = cmd.enabled,
                affected,
                error = %err,
                "emergency toggle stopped part way"
            ),
        }

        let action = if cmd.enabled {
            AdminAction::EmergencyEnable
        } else {
            AdminAction::EmergencyDisable
        };
        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(action, actor_id, now)
                .with_reason(reason.clone())
                .with_affected(affected),
        )
        .await;

        publish_best_effort(
            self.event_publisher.as_ref(),
            &metadata,
            VoucherEvent::EmergencyToggled {
                enabled: cmd.enabled,
                reason,
                affected,
                occurred_at: now,
            },
        )
        .await;

        outcome.map(|()| affected)
    }

    /// `affected` only counts changes whose chunk committed.
    async fn toggle_chunks(
        &self,
        ids: &[VoucherId],
        enabled: bool,
        now: Timestamp,
        affected: &mut u64,
    ) -> Result<(), VoucherError> {
        for chunk in ids.chunks(self.chunk_size) {
            let mut tx = self.ledger.begin().await?;
            let mut changed = 0u64;
            for mut voucher in tx.lock_vouchers(chunk).await? {
                if enabled && voucher.is_expired(&now) {
                    continue;
                }
                if voucher.set_active(enabled, now) {
                    tx.save_voucher(&voucher).await?;
                    changed += 1;
                }
            }
            tx.commit().await?;
            *affected += changed;
            debug!(chunk = chunk.len(), changed, "emergency toggle chunk committed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_fixtures::{admin_meta, user_meta, vendor_id, Fixture};
    use crate::application::handlers::voucher_admin::{SuspendVendorCommand, SuspendVendorHandler};
    use crate::domain::voucher::test_support;
    use std::time::Duration;

    fn handler(fx: &Fixture) -> EmergencyToggleHandler {
        EmergencyToggleHandler::new(
            fx.store.clone(),
            fx.store.clone(),
            fx.store.clone(),
            fx.bus.clone(),
        )
        .with_max_bulk_size(2)
    }

    fn toggle(enabled: bool) -> EmergencyToggleCommand {
        EmergencyToggleCommand {
            enabled,
            reason: "payment provider outage".to_string(),
        }
    }

    #[tokio::test]
    async fn disable_then_enable_across_chunks() {
        let fx = Fixture::new();
        let a = fx.seed_default("vendor-1", "CODEAAAA").await;
        let b = fx.seed_default("vendor-1", "CODEBBBB").await;
        let c = fx.seed_default("vendor-2", "CODECCCC").await;

        let mut draft = test_support::draft("EXPIRED1");
        draft.valid_from = Timestamp::now().minus_days(10);
        draft.valid_until = Timestamp::now().minus_days(1);
        let expired = fx.seed("vendor-2", draft).await;

        let disabled = handler(&fx).handle(toggle(false), admin_meta()).await.unwrap();
        assert_eq!(disabled, 4);
        for id in [a.id, b.id, c.id, expired.id] {
            assert!(!fx.store.find_by_id(&id).await.unwrap().unwrap().is_active);
        }

        let enabled = handler(&fx).handle(toggle(true), admin_meta()).await.unwrap();
        assert_eq!(enabled, 3);
        assert!(!fx.store.find_by_id(&expired.id).await.unwrap().unwrap().is_active);

        let audit = fx.store.list_recent(10).await.unwrap();
        assert!(audit.iter().any(|e| e.action == AdminAction::EmergencyDisable));
        assert!(audit.iter().any(|e| e.action == AdminAction::EmergencyEnable));
        assert_eq!(
            fx.bus.events_of_type("voucher.admin.emergency_toggled.v1").len(),
            2
        );
    }

    #[tokio::test]
    async fn repeated_disable_affects_nothing() {
        let fx = Fixture::new();
        fx.seed_default("vendor-1", "CODEAAAA").await;

        handler(&fx).handle(toggle(false), admin_meta()).await.unwrap();
        let again = handler(&fx).handle(toggle(false), admin_meta()).await.unwrap();

        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn requires_admin_and_reason() {
        let fx = Fixture::new();

        let as_user = handler(&fx).handle(toggle(false), user_meta("user-1")).await;
        assert!(matches!(as_user, Err(VoucherError::Unauthorized(_))));

        let no_reason = handler(&fx)
            .handle(
                EmergencyToggleCommand {
                    enabled: false,
                    reason: " ".to_string(),
                },
                admin_meta(),
            )
            .await;
        assert!(matches!(no_reason, Err(VoucherError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn failed_chunk_still_audits_committed_work() {
        let fx = Fixture::with_lock_timeout(Duration::from_millis(50));
        let a = fx.seed_default("vendor-1", "CODEAAAA").await;
        let b = fx.seed_default("vendor-1", "CODEBBBB").await;
        let (first, second) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };

        // Hold the row lock of the voucher in the second chunk.
        let mut blocker = fx.store.begin().await.unwrap();
        blocker.lock_voucher(&second).await.unwrap();

        let result = handler(&fx)
            .with_max_bulk_size(1)
            .handle(toggle(false), admin_meta())
            .await;
        drop(blocker);

        assert!(matches!(result, Err(VoucherError::Infrastructure(_))));
        assert!(!fx.store.find_by_id(&first).await.unwrap().unwrap().is_active);
        assert!(fx.store.find_by_id(&second).await.unwrap().unwrap().is_active);

        let audit = fx.store.list_recent(10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AdminAction::EmergencyDisable);
        assert_eq!(audit[0].affected, 1);

        let events = fx.bus.events_of_type("voucher.admin.emergency_toggled.v1");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["affected"], 1);
        assert_eq!(events[0].metadata.actor.as_deref(), Some("ADMIN"));
    }

    #[tokio::test]
    async fn enable_reactivates_suspended_vendor_vouchers() {
        let fx = Fixture::new();
        let voucher = fx.seed_default("vendor-1", "CODEAAAA").await;
        SuspendVendorHandler::new(
            fx.store.clone(),
            fx.store.clone(),
            fx.store.clone(),
            fx.bus.clone(),
        )
        .handle(
            SuspendVendorCommand {
                vendor_id: vendor_id("vendor-1"),
                reason: "chargebacks".to_string(),
            },
            admin_meta(),
        )
        .await
        .unwrap();
        assert!(!fx.store.find_by_id(&voucher.id).await.unwrap().unwrap().is_active);

        let enabled = handler(&fx).handle(toggle(true), admin_meta()).await.unwrap();

        assert_eq!(enabled, 1);
        assert!(fx.store.find_by_id(&voucher.id).await.unwrap().unwrap().is_active);
    }
}
