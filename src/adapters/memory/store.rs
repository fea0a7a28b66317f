//! In-memory voucher store.
//!
//! One shared state behind a `std::sync::Mutex` holds vouchers, usage rows,
//! fraud flags and audit entries. Row locks are per-voucher
//! `tokio::sync::Mutex`es, held by a ledger transaction until it commits or
//! is dropped. Transactions stage their writes and apply them under the
//! state mutex in one step, so readers never observe a half-applied
//! redemption.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::foundation::{
    DomainError, ErrorCode, Timestamp, VendorId, VoucherId, VoucherUsageId,
};
use crate::domain::voucher::{AdminAuditEntry, CouponCode, FraudFlag, Voucher, VoucherUsage};
use crate::ports::{AdminAuditLog, VoucherRepository};

/// Default time a transaction waits for a voucher row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub(super) struct StoreState {
    pub vouchers: HashMap<VoucherId, Voucher>,
    pub usages: Vec<VoucherUsage>,
    pub fraud_flags: HashMap<VoucherUsageId, FraudFlag>,
    pub audit: Vec<AdminAuditEntry>,
}

impl StoreState {
    /// Returns the ID of another voucher already using `(vendor_id, code)`.
    pub fn code_owner(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
        excluding: Option<&VoucherId>,
    ) -> Option<VoucherId> {
        self.vouchers
            .values()
            .find(|v| {
                &v.vendor_id == vendor_id
                    && &v.coupon_code == code
                    && Some(&v.id) != excluding
            })
            .map(|v| v.id)
    }
}

pub(super) struct Shared {
    state: Mutex<StoreState>,
    row_locks: Mutex<HashMap<VoucherId, Arc<tokio::sync::Mutex<()>>>>,
    pub lock_timeout: Duration,
}

impl Shared {
    pub fn state(&self) -> Result<MutexGuard<'_, StoreState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Voucher store state poisoned"))
    }

    pub fn row_lock(&self, id: &VoucherId) -> Result<Arc<tokio::sync::Mutex<()>>, DomainError> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Row lock table poisoned"))?;
        Ok(locks.entry(*id).or_default().clone())
    }

    pub fn forget_row_lock(&self, id: &VoucherId) {
        if let Ok(mut locks) = self.row_locks.lock() {
            locks.remove(id);
        }
    }
}

/// In-memory implementation of every persistence port.
///
/// Cloning is cheap and clones share state.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryVoucherStore::new());
/// let engine = VoucherEngine::new(store.clone(), store.clone(), store, bus);
/// ```
#[derive(Clone)]
pub struct InMemoryVoucherStore {
    pub(super) shared: Arc<Shared>,
}

impl InMemoryVoucherStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StoreState::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }
}

impl Default for InMemoryVoucherStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn duplicate_code(code: &CouponCode) -> DomainError {
    DomainError::new(
        ErrorCode::DuplicateCouponCode,
        format!("Coupon code '{}' already exists for this vendor", code),
    )
    .with_detail("coupon_code", code.as_str())
}

#[async_trait]
impl VoucherRepository for InMemoryVoucherStore {
    async fn insert(&self, voucher: &Voucher) -> Result<(), DomainError> {
        let mut state = self.shared.state()?;
        if state
            .code_owner(&voucher.vendor_id, &voucher.coupon_code, None)
            .is_some()
        {
            return Err(duplicate_code(&voucher.coupon_code));
        }
        state.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, DomainError> {
        Ok(self.shared.state()?.vouchers.get(id).cloned())
    }

    async fn find_by_code(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError> {
        let state = self.shared.state()?;
        Ok(state
            .code_owner(vendor_id, code, None)
            .and_then(|id| state.vouchers.get(&id).cloned()))
    }

    async fn code_exists(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
        excluding: Option<&VoucherId>,
    ) -> Result<bool, DomainError> {
        Ok(self
            .shared
            .state()?
            .code_owner(vendor_id, code, excluding)
            .is_some())
    }

    async fn list_by_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Voucher>, DomainError> {
        let mut vouchers: Vec<Voucher> = self
            .shared
            .state()?
            .vouchers
            .values()
            .filter(|v| &v.vendor_id == vendor_id)
            .cloned()
            .collect();
        vouchers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(vouchers)
    }

    async fn list_all_ids(&self) -> Result<Vec<VoucherId>, DomainError> {
        let mut ids: Vec<VoucherId> = self.shared.state()?.vouchers.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_expired_before(&self, cutoff: Timestamp) -> Result<Vec<Voucher>, DomainError> {
        Ok(self
            .shared
            .state()?
            .vouchers
            .values()
            .filter(|v| v.validity.valid_until().is_before(&cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AdminAuditLog for InMemoryVoucherStore {
    async fn append(&self, entry: &AdminAuditEntry) -> Result<(), DomainError> {
        self.shared.state()?.audit.push(entry.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AdminAuditEntry>, DomainError> {
        Ok(self
            .shared
            .state()?
            .audit
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<AdminAuditEntry>, DomainError> {
        Ok(self
            .shared
            .state()?
            .audit
            .iter()
            .rev()
            .filter(|e| e.voucher_id.as_ref() == Some(voucher_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::voucher::test_support::voucher;
    use crate::domain::voucher::AdminAction;

    #[tokio::test]
    async fn insert_rejects_duplicate_code_for_same_vendor() {
        let store = InMemoryVoucherStore::new();
        store.insert(&voucher("vendor-1", "SAVE10")).await.unwrap();

        let err = store
            .insert(&voucher("vendor-1", "save10"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCouponCode);
    }

    #[tokio::test]
    async fn same_code_is_allowed_for_different_vendors() {
        let store = InMemoryVoucherStore::new();
        store.insert(&voucher("vendor-1", "SAVE10")).await.unwrap();
        store.insert(&voucher("vendor-2", "SAVE10")).await.unwrap();
        assert_eq!(store.list_all_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn code_exists_ignores_excluded_voucher() {
        let store = InMemoryVoucherStore::new();
        let v = voucher("vendor-1", "SAVE10");
        store.insert(&v).await.unwrap();

        assert!(store
            .code_exists(&v.vendor_id, &v.coupon_code, None)
            .await
            .unwrap());
        assert!(!store
            .code_exists(&v.vendor_id, &v.coupon_code, Some(&v.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn find_by_code_scopes_to_vendor() {
        let store = InMemoryVoucherStore::new();
        let v = voucher("vendor-1", "SAVE10");
        store.insert(&v).await.unwrap();

        let other = VendorId::new("vendor-2").unwrap();
        assert!(store
            .find_by_code(&other, &v.coupon_code)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .find_by_code(&v.vendor_id, &v.coupon_code)
                .await
                .unwrap()
                .map(|found| found.id),
            Some(v.id)
        );
    }

    #[tokio::test]
    async fn audit_entries_list_newest_first() {
        let store = InMemoryVoucherStore::new();
        let voucher_id = VoucherId::new();
        for action in [AdminAction::OverrideLimits, AdminAction::ForceDelete] {
            store
                .append(
                    &AdminAuditEntry::new(action, "admin-1", Timestamp::now())
                        .with_voucher(voucher_id),
                )
                .await
                .unwrap();
        }

        let entries = store.list_for_voucher(&voucher_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AdminAction::ForceDelete);
        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }
}
