//! Usage ledger port.
//!
//! Owns voucher usage rows and the running usage counter on each voucher.
//! The transactional primitives live on [`LedgerTransaction`]; a
//! transaction begins by locking the voucher rows it will touch and every
//! other call on it assumes those locks are held.
//!
//! # Redemption
//!
//! ```ignore
//! let mut tx = ledger.begin().await?;
//! let voucher = tx.lock_voucher_by_code(&vendor_id, &code).await?.ok_or(...)?;
//! let prior = tx.count_user_redemptions(&voucher.id, &user_id).await?;
//! evaluate(&voucher, &request)?;
//! tx.record_usage(&usage).await?;
//! tx.increment_usage_counter(&voucher.id).await?;
//! tx.commit().await?;
//! ```
//!
//! Dropping a transaction without committing rolls it back.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId, VendorId, VoucherId, VoucherUsageId};
use crate::domain::voucher::{CouponCode, FraudFlag, Voucher, VoucherUsage};

/// Entry point to the ledger.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError>;

    /// Find a single usage row.
    async fn find_usage(&self, id: &VoucherUsageId) -> Result<Option<VoucherUsage>, DomainError>;

    /// Number of usage rows for a voucher.
    async fn count_usages(&self, voucher_id: &VoucherId) -> Result<u64, DomainError>;

    /// Usage rows for a voucher (unlocked read), newest first.
    async fn list_usages_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<VoucherUsage>, DomainError>;

    /// Usage rows for a user across all vouchers, newest first.
    async fn list_usages_for_user(&self, user_id: &UserId)
        -> Result<Vec<VoucherUsage>, DomainError>;

    /// Unlocked count of a user's redemptions of a voucher, for previews.
    async fn count_user_redemptions(
        &self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError>;

    /// Store or replace the fraud flag for a usage.
    ///
    /// # Errors
    ///
    /// - `UsageNotFound` if the usage does not exist
    async fn flag_usage(&self, flag: &FraudFlag) -> Result<(), DomainError>;

    /// Fraud flags raised against a voucher's usages.
    async fn list_fraud_flags(&self, voucher_id: &VoucherId) -> Result<Vec<FraudFlag>, DomainError>;
}

/// A unit of work over locked voucher rows.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Lock a voucher row, blocking until no other transaction holds it.
    ///
    /// # Errors
    ///
    /// - `LockTimeout` when the lock cannot be acquired in time
    async fn lock_voucher(&mut self, id: &VoucherId) -> Result<Option<Voucher>, DomainError>;

    /// Lock a vendor's voucher by coupon code.
    async fn lock_voucher_by_code(
        &mut self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError>;

    /// Lock several voucher rows in ID order. Unknown IDs are skipped.
    async fn lock_vouchers(&mut self, ids: &[VoucherId]) -> Result<Vec<Voucher>, DomainError>;

    /// Count the user's usage rows for a locked voucher.
    async fn count_user_redemptions(
        &mut self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError>;

    /// Count all usage rows for a locked voucher.
    async fn count_usages(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError>;

    /// List all usage rows for a locked voucher.
    async fn list_usages(&mut self, voucher_id: &VoucherId)
        -> Result<Vec<VoucherUsage>, DomainError>;

    /// Insert a usage row.
    async fn record_usage(&mut self, usage: &VoucherUsage) -> Result<(), DomainError>;

    /// Add one to `current_usage_count` and return the new value.
    ///
    /// # Errors
    ///
    /// - `GlobalLimitExceeded` if the counter is already at `total_usage_limit`
    async fn increment_usage_counter(&mut self, voucher_id: &VoucherId) -> Result<u32, DomainError>;

    /// Write a locked voucher back, including its counter.
    ///
    /// # Errors
    ///
    /// - `DuplicateCouponCode` if the new code collides within the vendor
    ///   (may surface at commit instead)
    async fn save_voucher(&mut self, voucher: &Voucher) -> Result<(), DomainError>;

    /// Delete a locked voucher together with its usage rows and fraud flags.
    ///
    /// Returns the number of usage rows removed.
    async fn delete_voucher(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError>;

    /// Make all writes visible and release the locks.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discard all writes and release the locks.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_traits_are_object_safe() {
        fn _accepts_ledger(_ledger: &dyn UsageLedger) {}
        fn _accepts_tx(_tx: Box<dyn LedgerTransaction>) {}
    }
}
