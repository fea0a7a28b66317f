//! Shared wiring for handler tests.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::InMemoryVoucherStore;
use crate::application::handlers::voucher::{ApplyVoucherCommand, ApplyVoucherHandler};
use crate::domain::foundation::{
    AuthenticatedCaller, BookingId, CommandMetadata, Money, ServiceId, Timestamp, UserId,
    VendorId,
};
use crate::domain::voucher::{test_support, ServiceType, Voucher, VoucherDraft, VoucherUsage};
use crate::ports::VoucherRepository;

pub struct Fixture {
    pub store: Arc<InMemoryVoucherStore>,
    pub bus: Arc<InMemoryEventBus>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryVoucherStore::new()),
            bus: Arc::new(InMemoryEventBus::new()),
        }
    }

    /// Store whose row locks give up after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            store: Arc::new(InMemoryVoucherStore::with_lock_timeout(lock_timeout)),
            bus: Arc::new(InMemoryEventBus::new()),
        }
    }

    /// Inserts a voucher built from `draft` for `vendor`.
    pub async fn seed(&self, vendor: &str, draft: VoucherDraft) -> Voucher {
        let voucher = Voucher::create(vendor_id(vendor), draft, Timestamp::now()).unwrap();
        self.store.insert(&voucher).await.unwrap();
        voucher
    }

    /// Inserts the default 10% voucher.
    pub async fn seed_default(&self, vendor: &str, code: &str) -> Voucher {
        self.seed(vendor, test_support::draft(code)).await
    }

    /// Redeems `code` at `vendor` for `user` through the real coordinator.
    pub async fn redeem(&self, vendor: &str, code: &str, user: &str, cents: i64) -> VoucherUsage {
        ApplyVoucherHandler::new(self.store.clone(), self.bus.clone())
            .handle(
                ApplyVoucherCommand {
                    coupon_code: code.to_string(),
                    vendor_id: vendor_id(vendor),
                    user_id: user_id(user),
                    booking_id: BookingId::new(format!("booking-{}-{}", code, user)).unwrap(),
                    service_type: ServiceType::new("spa").unwrap(),
                    service_id: ServiceId::new("svc-1").unwrap(),
                    original_amount: Money::from_cents(cents),
                },
                user_meta(user),
            )
            .await
            .unwrap()
    }
}

pub fn vendor_id(id: &str) -> VendorId {
    VendorId::new(id).unwrap()
}

pub fn user_id(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn vendor_meta(id: &str) -> CommandMetadata {
    CommandMetadata::new(AuthenticatedCaller::vendor(vendor_id(id)))
}

pub fn user_meta(id: &str) -> CommandMetadata {
    CommandMetadata::new(AuthenticatedCaller::user(user_id(id)))
}

pub fn admin_meta() -> CommandMetadata {
    CommandMetadata::new(AuthenticatedCaller::admin("ops-1")).with_correlation_id("incident-42")
}
