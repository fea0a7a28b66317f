//! Administrative audit trail.
//!
//! Every administrative mutation appends one entry. Entries record the
//! acting administrator and reason, which the voucher and usage rows have
//! no columns for. Force deletions also carry a JSON archive of the deleted
//! voucher and its usage history.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::domain::foundation::{AuditEntryId, Timestamp, VendorId, VoucherId, VoucherUsageId};

/// Administrative operation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    BulkUpdate,
    BulkDeactivate,
    SuspendVendor,
    RestoreVendor,
    OverrideLimits,
    MarkFraudulent,
    CleanupExpired,
    ForceDelete,
    SystemPromotion,
    EmergencyDisable,
    EmergencyEnable,
    ReconcileCounter,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::BulkUpdate => "bulk_update",
            AdminAction::BulkDeactivate => "bulk_deactivate",
            AdminAction::SuspendVendor => "suspend_vendor",
            AdminAction::RestoreVendor => "restore_vendor",
            AdminAction::OverrideLimits => "override_limits",
            AdminAction::MarkFraudulent => "mark_fraudulent",
            AdminAction::CleanupExpired => "cleanup_expired",
            AdminAction::ForceDelete => "force_delete",
            AdminAction::SystemPromotion => "system_promotion",
            AdminAction::EmergencyDisable => "emergency_disable",
            AdminAction::EmergencyEnable => "emergency_enable",
            AdminAction::ReconcileCounter => "reconcile_counter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            AdminAction::BulkUpdate,
            AdminAction::BulkDeactivate,
            AdminAction::SuspendVendor,
            AdminAction::RestoreVendor,
            AdminAction::OverrideLimits,
            AdminAction::MarkFraudulent,
            AdminAction::CleanupExpired,
            AdminAction::ForceDelete,
            AdminAction::SystemPromotion,
            AdminAction::EmergencyDisable,
            AdminAction::EmergencyEnable,
            AdminAction::ReconcileCounter,
        ]
        .into_iter()
        .find(|action| action.as_str() == s)
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the administrative audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAuditEntry {
    pub id: AuditEntryId,
    pub action: AdminAction,
    pub actor_id: String,
    pub reason: Option<String>,
    pub voucher_id: Option<VoucherId>,
    pub vendor_id: Option<VendorId>,
    pub usage_id: Option<VoucherUsageId>,
    /// Number of vouchers (or usages) the action touched.
    pub affected: u64,
    /// Archive of deleted state, present for force deletions.
    pub snapshot: Option<JsonValue>,
    pub occurred_at: Timestamp,
}

impl AdminAuditEntry {
    pub fn new(action: AdminAction, actor_id: impl Into<String>, occurred_at: Timestamp) -> Self {
        Self {
            id: AuditEntryId::new(),
            action,
            actor_id: actor_id.into(),
            reason: None,
            voucher_id: None,
            vendor_id: None,
            usage_id: None,
            affected: 0,
            snapshot: None,
            occurred_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_voucher(mut self, voucher_id: VoucherId) -> Self {
        self.voucher_id = Some(voucher_id);
        self
    }

    pub fn with_vendor(mut self, vendor_id: VendorId) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_usage(mut self, usage_id: VoucherUsageId) -> Self {
        self.usage_id = Some(usage_id);
        self
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    pub fn with_snapshot(mut self, snapshot: JsonValue) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}
