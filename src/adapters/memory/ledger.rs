//! In-memory usage ledger and its transactions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::domain::foundation::{
    DomainError, ErrorCode, UserId, VendorId, VoucherId, VoucherUsageId,
};
use crate::domain::voucher::{CouponCode, FraudFlag, Voucher, VoucherUsage};
use crate::ports::{LedgerTransaction, UsageLedger};

use super::store::{duplicate_code, InMemoryVoucherStore, Shared};

#[async_trait]
impl UsageLedger for InMemoryVoucherStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        Ok(Box::new(InMemoryLedgerTransaction {
            shared: Arc::clone(&self.shared),
            guards: HashMap::new(),
            working: HashMap::new(),
            new_usages: Vec::new(),
            deleted: HashSet::new(),
        }))
    }

    async fn find_usage(&self, id: &VoucherUsageId) -> Result<Option<VoucherUsage>, DomainError> {
        Ok(self
            .shared
            .state()?
            .usages
            .iter()
            .find(|u| &u.id == id)
            .cloned())
    }

    async fn count_usages(&self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        Ok(self
            .shared
            .state()?
            .usages
            .iter()
            .filter(|u| &u.voucher_id == voucher_id)
            .count() as u64)
    }

    async fn list_usages_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        Ok(self
            .shared
            .state()?
            .usages
            .iter()
            .rev()
            .filter(|u| &u.voucher_id == voucher_id)
            .cloned()
            .collect())
    }

    async fn list_usages_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        Ok(self
            .shared
            .state()?
            .usages
            .iter()
            .rev()
            .filter(|u| &u.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_user_redemptions(
        &self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError> {
        let count = self
            .shared
            .state()?
            .usages
            .iter()
            .filter(|u| &u.voucher_id == voucher_id && &u.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn flag_usage(&self, flag: &FraudFlag) -> Result<(), DomainError> {
        let mut state = self.shared.state()?;
        if !state.usages.iter().any(|u| u.id == flag.usage_id) {
            return Err(DomainError::new(
                ErrorCode::UsageNotFound,
                format!("Voucher usage not found: {}", flag.usage_id),
            )
            .with_detail("usage_id", flag.usage_id.to_string()));
        }
        state.fraud_flags.insert(flag.usage_id, flag.clone());
        Ok(())
    }

    async fn list_fraud_flags(&self, voucher_id: &VoucherId) -> Result<Vec<FraudFlag>, DomainError> {
        let mut flags: Vec<FraudFlag> = self
            .shared
            .state()?
            .fraud_flags
            .values()
            .filter(|f| &f.voucher_id == voucher_id)
            .cloned()
            .collect();
        flags.sort_by(|a, b| b.flagged_at.cmp(&a.flagged_at));
        Ok(flags)
    }
}

/// A transaction over the in-memory store.
///
/// Locked vouchers are copied into `working` and mutated there. Nothing
/// reaches the shared state until `commit`.
struct InMemoryLedgerTransaction {
    shared: Arc<Shared>,
    guards: HashMap<VoucherId, OwnedMutexGuard<()>>,
    working: HashMap<VoucherId, Voucher>,
    new_usages: Vec<VoucherUsage>,
    deleted: HashSet<VoucherId>,
}

impl InMemoryLedgerTransaction {
    fn ensure_locked(&self, voucher_id: &VoucherId) -> Result<(), DomainError> {
        if self.working.contains_key(voucher_id) && !self.deleted.contains(voucher_id) {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Voucher {} is not locked by this transaction", voucher_id),
            ))
        }
    }

    fn existing_usages<'a>(
        &'a self,
        usages: &'a [VoucherUsage],
        voucher_id: &'a VoucherId,
    ) -> impl Iterator<Item = &'a VoucherUsage> + 'a {
        usages
            .iter()
            .chain(self.new_usages.iter())
            .filter(move |u| &u.voucher_id == voucher_id)
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryLedgerTransaction {
    async fn lock_voucher(&mut self, id: &VoucherId) -> Result<Option<Voucher>, DomainError> {
        if self.deleted.contains(id) {
            return Ok(None);
        }
        if let Some(voucher) = self.working.get(id) {
            return Ok(Some(voucher.clone()));
        }

        let row_lock = self.shared.row_lock(id)?;
        let guard = tokio::time::timeout(self.shared.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| {
                DomainError::new(
                    ErrorCode::LockTimeout,
                    format!("Timed out waiting for lock on voucher {}", id),
                )
                .with_detail("voucher_id", id.to_string())
            })?;
        debug!(voucher_id = %id, "voucher row locked");

        let current = self.shared.state()?.vouchers.get(id).cloned();
        match current {
            Some(voucher) => {
                self.guards.insert(*id, guard);
                self.working.insert(*id, voucher.clone());
                Ok(Some(voucher))
            }
            None => Ok(None),
        }
    }

    async fn lock_voucher_by_code(
        &mut self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError> {
        // The code can change between lookup and lock, so confirm it after locking.
        for _ in 0..3 {
            let candidate = self.shared.state()?.code_owner(vendor_id, code, None);
            let Some(id) = candidate else {
                return Ok(None);
            };
            let already_held = self.working.contains_key(&id);
            match self.lock_voucher(&id).await? {
                Some(v) if &v.vendor_id == vendor_id && &v.coupon_code == code => {
                    return Ok(Some(v))
                }
                _ => {
                    if !already_held {
                        self.working.remove(&id);
                        self.guards.remove(&id);
                    }
                }
            }
        }
        Ok(None)
    }

    async fn lock_vouchers(&mut self, ids: &[VoucherId]) -> Result<Vec<Voucher>, DomainError> {
        let mut ordered: Vec<VoucherId> = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut locked = Vec::with_capacity(ordered.len());
        for id in &ordered {
            if let Some(voucher) = self.lock_voucher(id).await? {
                locked.push(voucher);
            }
        }
        Ok(locked)
    }

    async fn count_user_redemptions(
        &mut self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError> {
        self.ensure_locked(voucher_id)?;
        let state = self.shared.state()?;
        let count = self
            .existing_usages(&state.usages, voucher_id)
            .filter(|u| &u.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn count_usages(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        self.ensure_locked(voucher_id)?;
        let state = self.shared.state()?;
        Ok(self.existing_usages(&state.usages, voucher_id).count() as u64)
    }

    async fn list_usages(
        &mut self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        self.ensure_locked(voucher_id)?;
        let state = self.shared.state()?;
        Ok(self
            .existing_usages(&state.usages, voucher_id)
            .cloned()
            .collect())
    }

    async fn record_usage(&mut self, usage: &VoucherUsage) -> Result<(), DomainError> {
        self.ensure_locked(&usage.voucher_id)?;
        self.new_usages.push(usage.clone());
        Ok(())
    }

    async fn increment_usage_counter(&mut self, voucher_id: &VoucherId) -> Result<u32, DomainError> {
        self.ensure_locked(voucher_id)?;
        let voucher = self.working.get_mut(voucher_id).ok_or_else(|| {
            DomainError::new(ErrorCode::VoucherNotFound, "Voucher not found")
                .with_detail("voucher_id", voucher_id.to_string())
        })?;
        voucher.record_redemption().map_err(|reason| {
            DomainError::new(reason.code(), reason.message())
                .with_detail("voucher_id", voucher_id.to_string())
        })
    }

    async fn save_voucher(&mut self, voucher: &Voucher) -> Result<(), DomainError> {
        self.ensure_locked(&voucher.id)?;
        self.working.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn delete_voucher(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        self.ensure_locked(voucher_id)?;
        let removed = {
            let state = self.shared.state()?;
            self.existing_usages(&state.usages, voucher_id).count() as u64
        };
        self.new_usages.retain(|u| &u.voucher_id != voucher_id);
        self.deleted.insert(*voucher_id);
        Ok(removed)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DomainError> {
        {
            let mut state = self.shared.state()?;

            for voucher in self.working.values() {
                if self.deleted.contains(&voucher.id) {
                    continue;
                }
                let clash = state
                    .code_owner(&voucher.vendor_id, &voucher.coupon_code, Some(&voucher.id))
                    .filter(|other| !self.deleted.contains(other) && !self.working.contains_key(other));
                let staged_clash = self.working.values().any(|other| {
                    other.id != voucher.id
                        && !self.deleted.contains(&other.id)
                        && other.vendor_id == voucher.vendor_id
                        && other.coupon_code == voucher.coupon_code
                });
                if clash.is_some() || staged_clash {
                    return Err(duplicate_code(&voucher.coupon_code));
                }
            }

            for (id, voucher) in self.working.drain() {
                if self.deleted.contains(&id) {
                    state.vouchers.remove(&id);
                } else {
                    state.vouchers.insert(id, voucher);
                }
            }
            state.usages.append(&mut self.new_usages);

            if !self.deleted.is_empty() {
                let deleted = &self.deleted;
                let removed_usage_ids: HashSet<VoucherUsageId> = state
                    .usages
                    .iter()
                    .filter(|u| deleted.contains(&u.voucher_id))
                    .map(|u| u.id)
                    .collect();
                state.usages.retain(|u| !deleted.contains(&u.voucher_id));
                state
                    .fraud_flags
                    .retain(|usage_id, _| !removed_usage_ids.contains(usage_id));
            }
        }

        for id in &self.deleted {
            self.shared.forget_row_lock(id);
        }
        // Guards drop here, releasing the row locks.
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{BookingId, Money, ServiceId, Timestamp};
    use crate::domain::voucher::test_support::{draft, voucher};
    use crate::domain::voucher::{calculate_discount, DiscountType, ServiceType};
    use crate::ports::VoucherRepository;
    use std::time::Duration;

    fn usage_for(voucher: &Voucher, user: &str) -> VoucherUsage {
        VoucherUsage::record(
            voucher.id,
            UserId::new(user).unwrap(),
            BookingId::new("booking-1").unwrap(),
            ServiceType::new("VENUE").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            calculate_discount(DiscountType::Percentage, 10, Money::from_cents(10_000), None),
            Timestamp::now(),
        )
    }

    async fn limited_voucher(store: &InMemoryVoucherStore, limit: u32) -> Voucher {
        let mut d = draft("LIMITED");
        d.total_usage_limit = Some(limit);
        let v = Voucher::create(VendorId::new("vendor-1").unwrap(), d, Timestamp::now()).unwrap();
        store.insert(&v).await.unwrap();
        v
    }

    // ============================================================
    // Commit / Rollback
    // ============================================================

    #[tokio::test]
    async fn commit_applies_usage_and_counter_together() {
        let store = InMemoryVoucherStore::new();
        let v = limited_voucher(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_voucher(&v.id).await.unwrap().unwrap();
        tx.record_usage(&usage_for(&v, "user-1")).await.unwrap();
        assert_eq!(tx.increment_usage_counter(&v.id).await.unwrap(), 1);

        // Not visible before commit
        assert_eq!(store.count_usages(&v.id).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert_eq!(store.count_usages(&v.id).await.unwrap(), 1);
        let stored = store.find_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage_count, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_writes_nothing() {
        let store = InMemoryVoucherStore::new();
        let v = limited_voucher(&store, 5).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_voucher(&v.id).await.unwrap();
            tx.record_usage(&usage_for(&v, "user-1")).await.unwrap();
            tx.increment_usage_counter(&v.id).await.unwrap();
        }

        assert_eq!(store.count_usages(&v.id).await.unwrap(), 0);
        let stored = store.find_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage_count, 0);
    }

    #[tokio::test]
    async fn increment_is_guarded_by_total_limit() {
        let store = InMemoryVoucherStore::new();
        let v = limited_voucher(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_voucher(&v.id).await.unwrap();
        tx.increment_usage_counter(&v.id).await.unwrap();
        let err = tx.increment_usage_counter(&v.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::GlobalLimitExceeded);
    }

    #[tokio::test]
    async fn writes_require_a_held_lock() {
        let store = InMemoryVoucherStore::new();
        let v = limited_voucher(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.record_usage(&usage_for(&v, "user-1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    // ============================================================
    // Locking
    // ============================================================

    #[tokio::test]
    async fn second_transaction_waits_for_first() {
        let store = InMemoryVoucherStore::with_lock_timeout(Duration::from_millis(50));
        let v = limited_voucher(&store, 5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_voucher(&v.id).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let err = second.lock_voucher(&v.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LockTimeout);

        first.commit().await.unwrap();
        assert!(second.lock_voucher(&v.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_by_code_finds_vendor_voucher() {
        let store = InMemoryVoucherStore::new();
        let v = voucher("vendor-1", "SAVE10");
        store.insert(&v).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let locked = tx
            .lock_voucher_by_code(&v.vendor_id, &v.coupon_code)
            .await
            .unwrap();
        assert_eq!(locked.map(|l| l.id), Some(v.id));

        let other_vendor = VendorId::new("vendor-2").unwrap();
        assert!(tx
            .lock_voucher_by_code(&other_vendor, &v.coupon_code)
            .await
            .unwrap()
            .is_none());
    }

    // ============================================================
    // Save / Delete
    // ============================================================

    #[tokio::test]
    async fn commit_rejects_code_collision() {
        let store = InMemoryVoucherStore::new();
        let a = voucher("vendor-1", "FIRST");
        let b = voucher("vendor-1", "SECOND");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_voucher(&b.id).await.unwrap().unwrap();
        locked.coupon_code = a.coupon_code.clone();
        tx.save_voucher(&locked).await.unwrap();

        let err = tx.commit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCouponCode);
        let stored = store.find_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored.coupon_code.as_str(), "SECOND");
    }

    #[tokio::test]
    async fn delete_cascades_usages_and_flags() {
        let store = InMemoryVoucherStore::new();
        let v = limited_voucher(&store, 5).await;
        let usage = usage_for(&v, "user-1");

        let mut tx = store.begin().await.unwrap();
        tx.lock_voucher(&v.id).await.unwrap();
        tx.record_usage(&usage).await.unwrap();
        tx.increment_usage_counter(&v.id).await.unwrap();
        tx.commit().await.unwrap();

        store
            .flag_usage(&FraudFlag {
                usage_id: usage.id,
                voucher_id: v.id,
                reason: "stolen card".to_string(),
                flagged_by: "admin-1".to_string(),
                flagged_at: Timestamp::now(),
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.lock_voucher(&v.id).await.unwrap();
        assert_eq!(tx.delete_voucher(&v.id).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert!(store.find_by_id(&v.id).await.unwrap().is_none());
        assert!(store.find_usage(&usage.id).await.unwrap().is_none());
        assert!(store.list_fraud_flags(&v.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flagging_unknown_usage_fails() {
        let store = InMemoryVoucherStore::new();
        let err = store
            .flag_usage(&FraudFlag {
                usage_id: VoucherUsageId::new(),
                voucher_id: VoucherId::new(),
                reason: "x".to_string(),
                flagged_by: "admin-1".to_string(),
                flagged_at: Timestamp::now(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UsageNotFound);
    }
}
