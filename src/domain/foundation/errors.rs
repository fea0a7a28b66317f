//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    EmptyField,
    OutOfRange,
    InvalidFormat,
    InvalidDateRange,
    InvalidDiscountValue,
    InvalidUsageLimit,
    InvalidOrderAmount,

    // Not found errors
    VoucherNotFound,
    UsageNotFound,

    // Conflict errors
    DuplicateCouponCode,
    CannotDeleteUsedVoucher,

    // Eligibility errors
    VoucherNotActive,
    VoucherExpiredOrNotYetValid,
    BelowMinimumOrder,
    ServiceNotApplicable,
    GlobalLimitExceeded,
    UserLimitExceeded,

    // Authorization errors
    Unauthenticated,
    Unauthorized,

    // Infrastructure errors
    LockTimeout,
    DatabaseError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::EmptyField => "EMPTY_FIELD",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvalidDateRange => "INVALID_DATE_RANGE",
            ErrorCode::InvalidDiscountValue => "INVALID_DISCOUNT_VALUE",
            ErrorCode::InvalidUsageLimit => "INVALID_USAGE_LIMIT",
            ErrorCode::InvalidOrderAmount => "INVALID_ORDER_AMOUNT",
            ErrorCode::VoucherNotFound => "VOUCHER_NOT_FOUND",
            ErrorCode::UsageNotFound => "USAGE_NOT_FOUND",
            ErrorCode::DuplicateCouponCode => "DUPLICATE_COUPON_CODE",
            ErrorCode::CannotDeleteUsedVoucher => "CANNOT_DELETE_USED_VOUCHER",
            ErrorCode::VoucherNotActive => "VOUCHER_NOT_ACTIVE",
            ErrorCode::VoucherExpiredOrNotYetValid => "VOUCHER_EXPIRED_OR_NOT_YET_VALID",
            ErrorCode::BelowMinimumOrder => "BELOW_MINIMUM_ORDER",
            ErrorCode::ServiceNotApplicable => "SERVICE_NOT_APPLICABLE",
            ErrorCode::GlobalLimitExceeded => "GLOBAL_LIMIT_EXCEEDED",
            ErrorCode::UserLimitExceeded => "USER_LIMIT_EXCEEDED",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::LockTimeout => "LOCK_TIMEOUT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Creates a database error, used by persistence adapters.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::validation(err.field().to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("coupon_code");
        assert_eq!(format!("{}", err), "Field 'coupon_code' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("discount_percent", 1, 100, 150);
        assert_eq!(
            format!("{}", err),
            "Field 'discount_percent' must be between 1 and 100, got 150"
        );
    }

    #[test]
    fn validation_error_reports_field() {
        let err = ValidationError::invalid_format("coupon_code", "bad char");
        assert_eq!(err.field(), "coupon_code");
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::VoucherNotFound, "Voucher not found");
        assert_eq!(format!("{}", err), "[VOUCHER_NOT_FOUND] Voucher not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::ValidationFailed, "Validation failed")
            .with_detail("field", "valid_until")
            .with_detail("reason", "before valid_from");

        assert_eq!(err.details.get("field"), Some(&"valid_until".to_string()));
        assert_eq!(
            err.details.get("reason"),
            Some(&"before valid_from".to_string())
        );
    }

    #[test]
    fn domain_error_from_validation_error_keeps_field() {
        let err: DomainError = ValidationError::empty_field("title").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"title".to_string()));
    }
}
