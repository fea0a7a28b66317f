//! Row types and mapping helpers shared by the PostgreSQL adapters.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::foundation::{
    BookingId, DomainError, ErrorCode, Money, ServiceId, Timestamp, UserId, VendorId, VoucherId,
    VoucherUsageId,
};
use crate::domain::voucher::{
    Applicability, CouponCode, DiscountRule, DiscountType, ServiceType, UsageLimits,
    ValidityWindow, Voucher, VoucherUsage,
};

pub(super) const VOUCHER_COLUMNS: &str = "id, vendor_id, coupon_code, title, description, \
    discount_type, discount_value, max_discount_amount, min_order_value, applicable_for, \
    applicable_service_types, applicable_service_ids, total_usage_limit, usage_per_user, \
    current_usage_count, valid_from, valid_until, is_active, created_at, updated_at";

pub(super) const USAGE_COLUMNS: &str = "id, voucher_id, user_id, booking_id, original_amount, \
    discount_amount, final_amount, service_type, service_id, applied_at";

/// SQLSTATE for `lock_not_available`.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

pub(super) const VENDOR_CODE_CONSTRAINT: &str = "vouchers_vendor_code_key";

/// Database row representation of a voucher.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct VoucherRow {
    pub id: Uuid,
    pub vendor_id: String,
    pub coupon_code: String,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub min_order_value: Option<i64>,
    pub applicable_for: String,
    pub applicable_service_types: Vec<String>,
    pub applicable_service_ids: Vec<String>,
    pub total_usage_limit: Option<i32>,
    pub usage_per_user: i32,
    pub current_usage_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = DomainError;

    fn try_from(row: VoucherRow) -> Result<Self, Self::Error> {
        let kind = DiscountType::parse(&row.discount_type)
            .ok_or_else(|| corrupt("discount_type", &row.discount_type))?;
        let discount = DiscountRule::try_new(
            kind,
            row.discount_value,
            row.max_discount_amount.map(Money::from_cents),
        )
        .map_err(|e| corrupt("discount", e))?;

        let total = row
            .total_usage_limit
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt("total_usage_limit", e))?;
        let per_user =
            u32::try_from(row.usage_per_user).map_err(|e| corrupt("usage_per_user", e))?;
        let limits =
            UsageLimits::try_new(total, Some(per_user)).map_err(|e| corrupt("limits", e))?;

        let validity = ValidityWindow::try_new(
            Timestamp::from_datetime(row.valid_from),
            Timestamp::from_datetime(row.valid_until),
        )
        .map_err(|e| corrupt("validity", e))?;

        let applicability = match row.applicable_for.as_str() {
            "all_services" => Applicability::AllServices,
            "specific_services" => Applicability::SpecificServices {
                service_types: row
                    .applicable_service_types
                    .iter()
                    .map(ServiceType::new)
                    .collect::<Result<BTreeSet<_>, _>>()
                    .map_err(|e| corrupt("applicable_service_types", e))?,
                service_ids: row
                    .applicable_service_ids
                    .into_iter()
                    .map(ServiceId::new)
                    .collect::<Result<BTreeSet<_>, _>>()
                    .map_err(|e| corrupt("applicable_service_ids", e))?,
            },
            other => return Err(corrupt("applicable_for", other)),
        };

        Ok(Voucher {
            id: VoucherId::from_uuid(row.id),
            vendor_id: VendorId::new(row.vendor_id).map_err(|e| corrupt("vendor_id", e))?,
            coupon_code: CouponCode::try_new(&row.coupon_code)
                .map_err(|e| corrupt("coupon_code", e))?,
            title: row.title,
            description: row.description,
            discount,
            min_order_value: row.min_order_value.map(Money::from_cents),
            applicability,
            limits,
            current_usage_count: u32::try_from(row.current_usage_count)
                .map_err(|e| corrupt("current_usage_count", e))?,
            validity,
            is_active: row.is_active,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Database row representation of a voucher usage.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct UsageRow {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub user_id: String,
    pub booking_id: String,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub service_type: String,
    pub service_id: String,
    pub applied_at: DateTime<Utc>,
}

impl TryFrom<UsageRow> for VoucherUsage {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(VoucherUsage {
            id: VoucherUsageId::from_uuid(row.id),
            voucher_id: VoucherId::from_uuid(row.voucher_id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            booking_id: BookingId::new(row.booking_id).map_err(|e| corrupt("booking_id", e))?,
            original_amount: Money::from_cents(row.original_amount),
            discount_amount: Money::from_cents(row.discount_amount),
            final_amount: Money::from_cents(row.final_amount),
            service_type: ServiceType::new(&row.service_type)
                .map_err(|e| corrupt("service_type", e))?,
            service_id: ServiceId::new(row.service_id).map_err(|e| corrupt("service_id", e))?,
            applied_at: Timestamp::from_datetime(row.applied_at),
        })
    }
}

/// Splits applicability into the three stored columns.
pub(super) fn applicability_columns(
    applicability: &Applicability,
) -> (&'static str, Vec<String>, Vec<String>) {
    match applicability {
        Applicability::AllServices => (applicability.as_str(), Vec::new(), Vec::new()),
        Applicability::SpecificServices {
            service_types,
            service_ids,
        } => (
            applicability.as_str(),
            service_types.iter().map(|t| t.as_str().to_string()).collect(),
            service_ids.iter().map(|s| s.as_str().to_string()).collect(),
        ),
    }
}

/// Converts an optional limit for an `INTEGER` column.
pub(super) fn limit_column(field: &str, value: Option<u32>) -> Result<Option<i32>, DomainError> {
    value.map(|v| count_column(field, v)).transpose()
}

/// Converts a count for an `INTEGER` column, rejecting values it cannot hold.
pub(super) fn count_column(field: &str, value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::InvalidUsageLimit,
            format!("{} of {} does not fit the stored column", field, value),
        )
        .with_detail("field", field)
    })
}

fn corrupt(field: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid stored value for {}: {}", field, detail),
    )
}

/// Maps a sqlx error, recognising lock timeouts and deadlocks.
pub(super) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(
            db_err.code().as_deref(),
            Some(LOCK_NOT_AVAILABLE) | Some(DEADLOCK_DETECTED)
        ) {
            return DomainError::new(
                ErrorCode::LockTimeout,
                format!("{}: {}", context, db_err.message()),
            );
        }
    }
    DomainError::database(format!("{}: {}", context, err))
}

/// Maps a write error, turning the vendor/code unique violation into
/// `DuplicateCouponCode`.
pub(super) fn write_error(context: &str, code: &CouponCode, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(VENDOR_CODE_CONSTRAINT) {
            return DomainError::new(
                ErrorCode::DuplicateCouponCode,
                format!("Coupon code '{}' already exists for this vendor", code),
            )
            .with_detail("coupon_code", code.as_str());
        }
    }
    db_error(context, err)
}
