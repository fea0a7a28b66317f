//! Ownership trait for vendor-owned resources.
//!
//! Vouchers belong to exactly one vendor. Catalog operations require the
//! caller to be that vendor; the administrative surface bypasses the check
//! by holding administrator capability.
//!
//! # Example
//!
//! ```ignore
//! let voucher = repo.find_by_id(&id).await?.ok_or(...)?;
//! voucher.check_access(caller)?;  // Err(Unauthorized) for a foreign vendor
//! ```

use super::{AuthenticatedCaller, DomainError, ErrorCode, VendorId};

/// Trait for aggregates that have a single vendor owner.
pub trait OwnedByVendor {
    /// Returns the ID of the vendor who owns this resource.
    fn owner_vendor_id(&self) -> &VendorId;

    /// Checks if the given vendor is the owner.
    fn is_owned_by(&self, vendor_id: &VendorId) -> bool {
        self.owner_vendor_id() == vendor_id
    }

    /// Validates that the caller may manage this resource.
    ///
    /// Administrators always pass. Vendors pass only for their own resources.
    /// Everyone else is `Unauthorized`.
    fn check_access(&self, caller: &AuthenticatedCaller) -> Result<(), DomainError> {
        if caller.is_admin() {
            return Ok(());
        }
        match caller.as_vendor() {
            Some(vendor_id) if self.is_owned_by(&vendor_id) => Ok(()),
            _ => Err(DomainError::new(
                ErrorCode::Unauthorized,
                "Caller does not own this resource",
            )
            .with_detail("owner_id", self.owner_vendor_id().to_string())
            .with_detail("requested_by", caller.id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    struct Owned(VendorId);

    impl OwnedByVendor for Owned {
        fn owner_vendor_id(&self) -> &VendorId {
            &self.0
        }
    }

    fn vendor(id: &str) -> VendorId {
        VendorId::new(id).unwrap()
    }

    #[test]
    fn owner_vendor_has_access() {
        let resource = Owned(vendor("vendor-a"));
        let caller = AuthenticatedCaller::vendor(vendor("vendor-a"));
        assert!(resource.check_access(&caller).is_ok());
    }

    #[test]
    fn foreign_vendor_is_unauthorized() {
        let resource = Owned(vendor("vendor-a"));
        let caller = AuthenticatedCaller::vendor(vendor("vendor-b"));
        let err = resource.check_access(&caller).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.details.get("owner_id"), Some(&"vendor-a".to_string()));
    }

    #[test]
    fn admin_bypasses_ownership() {
        let resource = Owned(vendor("vendor-a"));
        assert!(resource.check_access(&AuthenticatedCaller::admin("ops")).is_ok());
    }

    #[test]
    fn end_user_is_unauthorized() {
        let resource = Owned(vendor("vendor-a"));
        let caller = AuthenticatedCaller::user(UserId::new("user-1").unwrap());
        assert!(resource.check_access(&caller).is_err());
    }
}
