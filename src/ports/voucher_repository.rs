//! Voucher repository port (catalog side).
//!
//! Creates vouchers and serves unlocked reads. Every write to an existing
//! voucher goes through a [`LedgerTransaction`](super::LedgerTransaction)
//! instead, so catalog edits serialize with live redemptions on the same
//! row lock.
//!
//! # Example
//!
//! ```ignore
//! if repo.code_exists(&vendor_id, &code, None).await? {
//!     return Err(VoucherError::duplicate_code(code.as_str()));
//! }
//! repo.insert(&voucher).await?;
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, VendorId, VoucherId};
use crate::domain::voucher::{CouponCode, Voucher};

/// Repository port for voucher definitions.
#[async_trait]
pub trait VoucherRepository: Send + Sync {
    /// Insert a new voucher.
    ///
    /// # Errors
    ///
    /// - `DuplicateCouponCode` if the vendor already has a voucher with this code
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, voucher: &Voucher) -> Result<(), DomainError>;

    /// Find a voucher by ID without locking it.
    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, DomainError>;

    /// Find a vendor's voucher by coupon code without locking it.
    async fn find_by_code(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError>;

    /// Returns true if the vendor already uses `code`, ignoring `excluding`.
    async fn code_exists(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
        excluding: Option<&VoucherId>,
    ) -> Result<bool, DomainError>;

    /// All vouchers owned by a vendor, newest first.
    async fn list_by_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Voucher>, DomainError>;

    /// IDs of every voucher in the system.
    async fn list_all_ids(&self) -> Result<Vec<VoucherId>, DomainError>;

    /// Vouchers whose `valid_until` is earlier than `cutoff`.
    async fn list_expired_before(&self, cutoff: Timestamp) -> Result<Vec<Voucher>, DomainError>;
}
