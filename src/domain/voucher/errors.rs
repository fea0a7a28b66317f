//! Voucher-specific error types.
//!
//! # Error Families
//!
//! | Error | Family | Retry? |
//! |-------|--------|--------|
//! | Unauthenticated / Unauthorized | access | no |
//! | NotFound / UsageNotFound | lookup | no |
//! | DuplicateCouponCode / CannotDeleteUsedVoucher | conflict | no |
//! | InvalidDateRange / InvalidDiscountValue / InvalidUsageLimit / InvalidOrderAmount / ValidationFailed | validation | no |
//! | Ineligible(reason) | eligibility | no |
//! | Infrastructure | transient | yes |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

use super::IneligibleReason;

/// Errors raised by the voucher engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherError {
    /// No caller identity was supplied.
    Unauthenticated,

    /// Caller lacks ownership or role.
    Unauthorized(String),

    /// Voucher does not resolve.
    NotFound(String),

    /// Voucher usage record does not resolve.
    UsageNotFound(String),

    /// The owning vendor already has a voucher with this code.
    DuplicateCouponCode(String),

    /// `valid_from` is not strictly before `valid_until`.
    InvalidDateRange,

    /// Discount value (or cap) is not acceptable.
    InvalidDiscountValue(String),

    /// Usage limits are not acceptable.
    InvalidUsageLimit(String),

    /// Order amount must be strictly positive.
    InvalidOrderAmount,

    /// Voucher has redemptions and cannot be deleted through the ordinary path.
    CannotDeleteUsedVoucher { voucher_id: String, usage_count: u64 },

    /// Redemption rejected by the eligibility evaluator.
    Ineligible(IneligibleReason),

    /// Field-level validation failure.
    ValidationFailed { field: String, message: String },

    /// Persistence or lock failure. The operation was rolled back and may be retried.
    Infrastructure(String),
}

impl VoucherError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        VoucherError::Unauthorized(reason.into())
    }

    pub fn not_found(id: impl ToString) -> Self {
        VoucherError::NotFound(id.to_string())
    }

    pub fn usage_not_found(id: impl ToString) -> Self {
        VoucherError::UsageNotFound(id.to_string())
    }

    pub fn duplicate_code(code: impl Into<String>) -> Self {
        VoucherError::DuplicateCouponCode(code.into())
    }

    pub fn invalid_discount(reason: impl Into<String>) -> Self {
        VoucherError::InvalidDiscountValue(reason.into())
    }

    pub fn invalid_usage_limit(reason: impl Into<String>) -> Self {
        VoucherError::InvalidUsageLimit(reason.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        VoucherError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        VoucherError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            VoucherError::Unauthenticated => ErrorCode::Unauthenticated,
            VoucherError::Unauthorized(_) => ErrorCode::Unauthorized,
            VoucherError::NotFound(_) => ErrorCode::VoucherNotFound,
            VoucherError::UsageNotFound(_) => ErrorCode::UsageNotFound,
            VoucherError::DuplicateCouponCode(_) => ErrorCode::DuplicateCouponCode,
            VoucherError::InvalidDateRange => ErrorCode::InvalidDateRange,
            VoucherError::InvalidDiscountValue(_) => ErrorCode::InvalidDiscountValue,
            VoucherError::InvalidUsageLimit(_) => ErrorCode::InvalidUsageLimit,
            VoucherError::InvalidOrderAmount => ErrorCode::InvalidOrderAmount,
            VoucherError::CannotDeleteUsedVoucher { .. } => ErrorCode::CannotDeleteUsedVoucher,
            VoucherError::Ineligible(reason) => reason.code(),
            VoucherError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            VoucherError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            VoucherError::Unauthenticated => "Authentication required".to_string(),
            VoucherError::Unauthorized(reason) => format!("Not authorized: {}", reason),
            VoucherError::NotFound(id) => format!("Voucher not found: {}", id),
            VoucherError::UsageNotFound(id) => format!("Voucher usage not found: {}", id),
            VoucherError::DuplicateCouponCode(code) => {
                format!("Coupon code '{}' already exists for this vendor", code)
            }
            VoucherError::InvalidDateRange => {
                "Voucher validity start must be before its end".to_string()
            }
            VoucherError::InvalidDiscountValue(reason) => {
                format!("Invalid discount value: {}", reason)
            }
            VoucherError::InvalidUsageLimit(reason) => format!("Invalid usage limit: {}", reason),
            VoucherError::InvalidOrderAmount => "Order amount must be greater than zero".to_string(),
            VoucherError::CannotDeleteUsedVoucher {
                voucher_id,
                usage_count,
            } => format!(
                "Voucher {} has been used {} time(s) and cannot be deleted",
                voucher_id, usage_count
            ),
            VoucherError::Ineligible(reason) => reason.message().to_string(),
            VoucherError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            VoucherError::Infrastructure(msg) => format!("Temporary failure: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    ///
    /// Only infrastructure failures qualify; a voucher that does not apply
    /// will not start applying on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoucherError::Infrastructure(_))
    }
}

impl std::fmt::Display for VoucherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for VoucherError {}

impl From<IneligibleReason> for VoucherError {
    fn from(reason: IneligibleReason) -> Self {
        VoucherError::Ineligible(reason)
    }
}

impl From<ValidationError> for VoucherError {
    fn from(err: ValidationError) -> Self {
        VoucherError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for VoucherError {
    fn from(err: DomainError) -> Self {
        let detail = |key: &str| err.details.get(key).cloned().unwrap_or_default();
        match err.code {
            ErrorCode::Unauthenticated => VoucherError::Unauthenticated,
            ErrorCode::Unauthorized => VoucherError::Unauthorized(err.message),
            ErrorCode::VoucherNotFound => VoucherError::NotFound(detail("voucher_id")),
            ErrorCode::UsageNotFound => VoucherError::UsageNotFound(detail("usage_id")),
            ErrorCode::DuplicateCouponCode => {
                VoucherError::DuplicateCouponCode(detail("coupon_code"))
            }
            ErrorCode::InvalidDateRange => VoucherError::InvalidDateRange,
            ErrorCode::InvalidDiscountValue => VoucherError::InvalidDiscountValue(err.message),
            ErrorCode::InvalidUsageLimit => VoucherError::InvalidUsageLimit(err.message),
            ErrorCode::InvalidOrderAmount => VoucherError::InvalidOrderAmount,
            ErrorCode::GlobalLimitExceeded => {
                VoucherError::Ineligible(IneligibleReason::GlobalLimitExceeded)
            }
            ErrorCode::UserLimitExceeded => {
                VoucherError::Ineligible(IneligibleReason::UserLimitExceeded)
            }
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => VoucherError::ValidationFailed {
                field: detail("field"),
                message: err.message,
            },
            _ => VoucherError::Infrastructure(err.to_string()),
        }
    }
}

impl From<VoucherError> for DomainError {
    fn from(err: VoucherError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
