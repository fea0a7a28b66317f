//! Authenticated caller types for the domain layer.
//!
//! The identity subsystem authenticates requests; the voucher engine only
//! consumes the result: an opaque identifier plus the capability the caller
//! holds. Any auth provider can populate these types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DomainError, ErrorCode, UserId, VendorId};

/// Capability an authenticated caller acts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallerRole {
    /// End-user redeeming vouchers against their bookings.
    User,
    /// Vendor managing their own vouchers.
    Vendor,
    /// Platform administrator with cross-vendor reach.
    Admin,
}

impl CallerRole {
    /// Tag attached to lifecycle events emitted on behalf of this role.
    pub fn actor_tag(&self) -> &'static str {
        match self {
            CallerRole::User => "USER",
            CallerRole::Vendor => "VENDOR",
            CallerRole::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.actor_tag())
    }
}

/// An authenticated caller as supplied by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedCaller {
    /// Opaque identifier of the caller.
    pub id: String,

    /// Capability the caller holds.
    pub role: CallerRole,
}

impl AuthenticatedCaller {
    pub fn user(id: UserId) -> Self {
        Self {
            id: id.as_str().to_string(),
            role: CallerRole::User,
        }
    }

    pub fn vendor(id: VendorId) -> Self {
        Self {
            id: id.as_str().to_string(),
            role: CallerRole::Vendor,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }

    /// Returns the caller as a vendor, if that is the capability held.
    pub fn as_vendor(&self) -> Option<VendorId> {
        match self.role {
            CallerRole::Vendor => VendorId::new(self.id.clone()).ok(),
            _ => None,
        }
    }

    /// Returns the caller as an end-user, if that is the capability held.
    pub fn as_user(&self) -> Option<UserId> {
        match self.role {
            CallerRole::User => UserId::new(self.id.clone()).ok(),
            _ => None,
        }
    }

    /// Fails with `Unauthorized` unless the caller holds administrator capability.
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::Unauthorized,
                "Administrator capability required",
            )
            .with_detail("caller_id", self.id.clone())
            .with_detail("role", self.role.to_string()))
        }
    }

    /// Returns the vendor identity or fails with `Unauthorized`.
    pub fn require_vendor(&self) -> Result<VendorId, DomainError> {
        self.as_vendor().ok_or_else(|| {
            DomainError::new(ErrorCode::Unauthorized, "Vendor capability required")
                .with_detail("caller_id", self.id.clone())
        })
    }
}
