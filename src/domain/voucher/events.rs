//! Voucher lifecycle events.
//!
//! Events are named in past tense. Catalog and redemption events use the
//! `voucher.*` namespace; administrative mutations use `voucher.admin.*` so
//! the notification sink can tell them apart from vendor-driven changes.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    BookingId, DomainEvent, Money, Timestamp, UserId, VendorId, VoucherId, VoucherUsageId,
};

use super::CouponCode;

/// Aggregate id used for events that span many vouchers.
pub const SYSTEM_AGGREGATE_ID: &str = "system";

/// Events emitted by the voucher engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoucherEvent {
    Created {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        coupon_code: CouponCode,
        occurred_at: Timestamp,
    },

    Updated {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        occurred_at: Timestamp,
    },

    Deleted {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        coupon_code: CouponCode,
        occurred_at: Timestamp,
    },

    StatusToggled {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        is_active: bool,
        occurred_at: Timestamp,
    },

    /// A redemption committed.
    Used {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        usage_id: VoucherUsageId,
        user_id: UserId,
        booking_id: BookingId,
        discount_amount: Money,
        final_amount: Money,
        occurred_at: Timestamp,
    },

    BulkUpdated {
        voucher_ids: Vec<VoucherId>,
        occurred_at: Timestamp,
    },

    BulkDeactivated {
        voucher_ids: Vec<VoucherId>,
        reason: String,
        occurred_at: Timestamp,
    },

    VendorSuspended {
        vendor_id: VendorId,
        reason: String,
        affected: u64,
        occurred_at: Timestamp,
    },

    VendorRestored {
        vendor_id: VendorId,
        affected: u64,
        occurred_at: Timestamp,
    },

    LimitsOverridden {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        occurred_at: Timestamp,
    },

    UsageFlagged {
        voucher_id: VoucherId,
        usage_id: VoucherUsageId,
        reason: String,
        occurred_at: Timestamp,
    },

    ExpiredCleanedUp {
        voucher_ids: Vec<VoucherId>,
        occurred_at: Timestamp,
    },

    ForceDeleted {
        voucher_id: VoucherId,
        vendor_id: VendorId,
        reason: String,
        usages_removed: u64,
        occurred_at: Timestamp,
    },

    PromotionCreated {
        voucher_ids: Vec<VoucherId>,
        title: String,
        occurred_at: Timestamp,
    },

    EmergencyToggled {
        enabled: bool,
        reason: String,
        affected: u64,
        occurred_at: Timestamp,
    },

    CounterReconciled {
        voucher_id: VoucherId,
        previous: u32,
        current: u32,
        occurred_at: Timestamp,
    },
}

impl VoucherEvent {
    /// Returns true for events raised through the administrative surface.
    pub fn is_administrative(&self) -> bool {
        self.event_type().starts_with("voucher.admin.")
    }
}

impl DomainEvent for VoucherEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VoucherEvent::Created { .. } => "voucher.created.v1",
            VoucherEvent::Updated { .. } => "voucher.updated.v1",
            VoucherEvent::Deleted { .. } => "voucher.deleted.v1",
            VoucherEvent::StatusToggled { .. } => "voucher.status_toggled.v1",
            VoucherEvent::Used { .. } => "voucher.used.v1",
            VoucherEvent::BulkUpdated { .. } => "voucher.admin.bulk_updated.v1",
            VoucherEvent::BulkDeactivated { .. } => "voucher.admin.bulk_deactivated.v1",
            VoucherEvent::VendorSuspended { .. } => "voucher.admin.vendor_suspended.v1",
            VoucherEvent::VendorRestored { .. } => "voucher.admin.vendor_restored.v1",
            VoucherEvent::LimitsOverridden { .. } => "voucher.admin.limits_overridden.v1",
            VoucherEvent::UsageFlagged { .. } => "voucher.admin.usage_flagged.v1",
            VoucherEvent::ExpiredCleanedUp { .. } => "voucher.admin.expired_cleaned_up.v1",
            VoucherEvent::ForceDeleted { .. } => "voucher.admin.force_deleted.v1",
            VoucherEvent::PromotionCreated { .. } => "voucher.admin.promotion_created.v1",
            VoucherEvent::EmergencyToggled { .. } => "voucher.admin.emergency_toggled.v1",
            VoucherEvent::CounterReconciled { .. } => "voucher.admin.counter_reconciled.v1",
        }
    }

    fn aggregate_id(&self) -> String {
        match self {
            VoucherEvent::Created { voucher_id, .. }
            | VoucherEvent::Updated { voucher_id, .. }
            | VoucherEvent::Deleted { voucher_id, .. }
            | VoucherEvent::StatusToggled { voucher_id, .. }
            | VoucherEvent::Used { voucher_id, .. }
            | VoucherEvent::LimitsOverridden { voucher_id, .. }
            | VoucherEvent::UsageFlagged { voucher_id, .. }
            | VoucherEvent::ForceDeleted { voucher_id, .. }
            | VoucherEvent::CounterReconciled { voucher_id, .. } => voucher_id.to_string(),
            VoucherEvent::VendorSuspended { vendor_id, .. }
            | VoucherEvent::VendorRestored { vendor_id, .. } => vendor_id.to_string(),
            VoucherEvent::BulkUpdated { .. }
            | VoucherEvent::BulkDeactivated { .. }
            | VoucherEvent::ExpiredCleanedUp { .. }
            | VoucherEvent::PromotionCreated { .. }
            | VoucherEvent::EmergencyToggled { .. } => SYSTEM_AGGREGATE_ID.to_string(),
        }
    }

    fn aggregate_type(&self) -> &'static str {
        match self {
            VoucherEvent::VendorSuspended { .. } | VoucherEvent::VendorRestored { .. } => {
                "Vendor"
            }
            _ => "Voucher",
        }
    }

    fn occurred_at(&self) -> Timestamp {
        match self {
            VoucherEvent::Created { occurred_at, .. }
            | VoucherEvent::Updated { occurred_at, .. }
            | VoucherEvent::Deleted { occurred_at, .. }
            | VoucherEvent::StatusToggled { occurred_at, .. }
            | VoucherEvent::Used { occurred_at, .. }
            | VoucherEvent::BulkUpdated { occurred_at, .. }
            | VoucherEvent::BulkDeactivated { occurred_at, .. }
            | VoucherEvent::VendorSuspended { occurred_at, .. }
            | VoucherEvent::VendorRestored { occurred_at, .. }
            | VoucherEvent::LimitsOverridden { occurred_at, .. }
            | VoucherEvent::UsageFlagged { occurred_at, .. }
            | VoucherEvent::ExpiredCleanedUp { occurred_at, .. }
            | VoucherEvent::ForceDeleted { occurred_at, .. }
            | VoucherEvent::PromotionCreated { occurred_at, .. }
            | VoucherEvent::EmergencyToggled { occurred_at, .. }
            | VoucherEvent::CounterReconciled { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventEnvelope;

    fn now() -> Timestamp {
        Timestamp::now()
    }

    // ============================================================
    // Event Type Tests
    // ============================================================

    #[test]
    fn used_event_routes_by_voucher() {
        let voucher_id = VoucherId::new();
        let event = VoucherEvent::Used {
            voucher_id,
            vendor_id: VendorId::new("vendor-1").unwrap(),
            usage_id: VoucherUsageId::new(),
            user_id: UserId::new("user-1").unwrap(),
            booking_id: BookingId::new("booking-1").unwrap(),
            discount_amount: Money::from_cents(2_500),
            final_amount: Money::from_cents(22_500),
            occurred_at: now(),
        };

        assert_eq!(event.event_type(), "voucher.used.v1");
        assert_eq!(event.aggregate_id(), voucher_id.to_string());
        assert!(!event.is_administrative());
    }

    #[test]
    fn admin_events_use_admin_namespace() {
        let event = VoucherEvent::EmergencyToggled {
            enabled: false,
            reason: "incident".to_string(),
            affected: 12,
            occurred_at: now(),
        };
        assert!(event.is_administrative());
        assert_eq!(event.aggregate_id(), SYSTEM_AGGREGATE_ID);
    }

    #[test]
    fn vendor_events_use_vendor_aggregate() {
        let event = VoucherEvent::VendorSuspended {
            vendor_id: VendorId::new("vendor-9").unwrap(),
            reason: "chargebacks".to_string(),
            affected: 3,
            occurred_at: now(),
        };
        assert_eq!(event.aggregate_type(), "Vendor");
        assert_eq!(event.aggregate_id(), "vendor-9");
    }

    // ============================================================
    // Envelope Tests
    // ============================================================

    #[test]
    fn envelope_carries_payload_and_version() {
        let event = VoucherEvent::CounterReconciled {
            voucher_id: VoucherId::new(),
            previous: 4,
            current: 3,
            occurred_at: now(),
        };
        let envelope = EventEnvelope::from_event(&event).unwrap();

        assert_eq!(envelope.event_type, "voucher.admin.counter_reconciled.v1");
        assert_eq!(envelope.schema_version, 1);
        let back: VoucherEvent = envelope.payload_as().unwrap();
        assert_eq!(back, event);
    }
}
