//! CreateSystemPromotionHandler - Fans one voucher out to many vendors.
//!
//! Every vendor in the list gets its own voucher built from the same draft.
//! The draft's coupon code is ignored: each vendor's code comes from the
//! command's template, or is generated from the configured prefix.
//!
//! Each insert commits on its own. If an insert fails for any reason other
//! than a taken code, the vouchers already created are audited and
//! announced before the error is returned.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::foundation::{CommandMetadata, Timestamp, VendorId};
use crate::domain::voucher::{
    AdminAction, AdminAuditEntry, CouponCode, Voucher, VoucherDraft, VoucherError, VoucherEvent,
};
use crate::ports::{AdminAuditLog, EventPublisher, VoucherRepository};

use super::super::publish_best_effort;
use super::{record_audit, require_admin, DEFAULT_MAX_BULK_SIZE};

/// Prefix for generated promotion codes.
pub const DEFAULT_PROMOTION_CODE_PREFIX: &str = "PROMO";

#[derive(Debug, Clone)]
pub struct CreateSystemPromotionCommand {
    pub vendor_ids: Vec<VendorId>,
    /// Code template; `{VENDOR}` and `{RANDOM}` are expanded per vendor.
    pub code_template: Option<String>,
    pub draft: VoucherDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemPromotionResult {
    pub created: Vec<Voucher>,
    /// Vendors that already had a voucher with the resolved code.
    pub skipped: Vec<VendorId>,
}

pub struct CreateSystemPromotionHandler {
    repository: Arc<dyn VoucherRepository>,
    audit_log: Arc<dyn AdminAuditLog>,
    event_publisher: Arc<dyn EventPublisher>,
    code_prefix: String,
    max_bulk_size: usize,
}

impl CreateSystemPromotionHandler {
    pub fn new(
        repository: Arc<dyn VoucherRepository>,
        audit_log: Arc<dyn AdminAuditLog>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            audit_log,
            event_publisher,
            code_prefix: DEFAULT_PROMOTION_CODE_PREFIX.to_string(),
            max_bulk_size: DEFAULT_MAX_BULK_SIZE,
        }
    }

    pub fn with_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_prefix = prefix.into();
        self
    }

    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.max_bulk_size = max_bulk_size;
        self
    }

    pub async fn handle(
        &self,
        cmd: CreateSystemPromotionCommand,
        metadata: CommandMetadata,
    ) -> Result<SystemPromotionResult, VoucherError> {
        let actor_id = require_admin(&metadata)?;

        let mut vendor_ids: Vec<VendorId> = Vec::with_capacity(cmd.vendor_ids.len());
        for vendor_id in cmd.vendor_ids {
            if !vendor_ids.contains(&vendor_id) {
                vendor_ids.push(vendor_id);
            }
        }
        if vendor_ids.is_empty() {
            return Err(VoucherError::validation(
                "vendor_ids",
                "at least one vendor is required",
            ));
        }
        if vendor_ids.len() > self.max_bulk_size {
            return Err(VoucherError::validation(
                "vendor_ids",
                format!(
                    "at most {} vendors per promotion, got {}",
                    self.max_bulk_size,
                    vendor_ids.len()
                ),
            ));
        }

        // Build everything first so a bad draft or template inserts nothing.
        let now = Timestamp::now();
        let mut vouchers = Vec::with_capacity(vendor_ids.len());
        for vendor_id in vendor_ids {
            let code = match &cmd.code_template {
                Some(template) => CouponCode::from_template(template, &vendor_id)?,
                None => CouponCode::generate(&self.code_prefix)?,
            };
            let mut draft = cmd.draft.clone();
            draft.coupon_code = code.as_str().to_string();
            vouchers.push(Voucher::create(vendor_id, draft, now)?);
        }

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        let outcome = self
            .insert_all(vouchers, &mut created, &mut skipped)
            .await;

        match &outcome {
            Ok(()) => info!(
                title = %cmd.draft.title,
                created = created.len(),
                skipped = skipped.len(),
                "system promotion created"
            ),
            Err(err) => warn!(
                title = %cmd.draft.title,
                created = created.len(),
                error = %err,
                "system promotion stopped part way"
            ),
        }

        record_audit(
            self.audit_log.as_ref(),
            AdminAuditEntry::new(AdminAction::SystemPromotion, actor_id, now)
                .with_affected(created.len() as u64),
        )
        .await;

        if !created.is_empty() {
            publish_best_effort(
                self.event_publisher.as_ref(),
                &metadata,
                VoucherEvent::PromotionCreated {
                    voucher_ids: created.iter().map(|v| v.id).collect(),
                    title: cmd.draft.title,
                    occurred_at: now,
                },
            )
            .await;
        }

        outcome.map(|()| SystemPromotionResult { created, skipped })
    }

    async fn insert_all(
        &self,
        vouchers: Vec<Voucher>,
        created: &mut Vec<Voucher>,
        skipped: &mut Vec<VendorId>,
    ) -> Result<(), VoucherError> {
        for voucher in vouchers {
            if self
                .repository
                .code_exists(&voucher.vendor_id, &voucher.coupon_code, None)
                .await?
            {
                skipped.push(voucher.vendor_id);
                continue;
            }
            match self.repository.insert(&voucher).await.map_err(VoucherError::from) {
                Ok(()) => created.push(voucher),
                Err(VoucherError::DuplicateCouponCode(code)) => {
                    warn!(vendor_id = %voucher.vendor_id, coupon_code = %code, "promotion code taken concurrently");
                    skipped.push(voucher.vendor_id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
