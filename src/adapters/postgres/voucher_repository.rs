//! PostgreSQL implementation of VoucherRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, VendorId, VoucherId};
use crate::domain::voucher::{CouponCode, Voucher};
use crate::ports::VoucherRepository;

use super::rows::{
    applicability_columns, count_column, db_error, limit_column, write_error, VoucherRow,
    VOUCHER_COLUMNS,
};

/// PostgreSQL implementation of the VoucherRepository port.
#[derive(Clone)]
pub struct PostgresVoucherRepository {
    pool: PgPool,
}

impl PostgresVoucherRepository {
    /// Creates a new PostgresVoucherRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherRepository for PostgresVoucherRepository {
    async fn insert(&self, voucher: &Voucher) -> Result<(), DomainError> {
        let (applicable_for, service_types, service_ids) =
            applicability_columns(&voucher.applicability);
        let total_usage_limit = limit_column("total_usage_limit", voucher.limits.total())?;
        let usage_per_user = count_column("usage_per_user", voucher.limits.per_user())?;
        let current_usage_count = count_column("current_usage_count", voucher.current_usage_count)?;

        sqlx::query(
            r#"
            INSERT INTO vouchers (
                id, vendor_id, coupon_code, title, description,
                discount_type, discount_value, max_discount_amount, min_order_value,
                applicable_for, applicable_service_types, applicable_service_ids,
                total_usage_limit, usage_per_user, current_usage_count,
                valid_from, valid_until, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                      $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(voucher.id.as_uuid())
        .bind(voucher.vendor_id.as_str())
        .bind(voucher.coupon_code.as_str())
        .bind(&voucher.title)
        .bind(&voucher.description)
        .bind(voucher.discount.kind().as_str())
        .bind(voucher.discount.value())
        .bind(voucher.discount.max_discount().map(|m| m.cents()))
        .bind(voucher.min_order_value.map(|m| m.cents()))
        .bind(applicable_for)
        .bind(service_types)
        .bind(service_ids)
        .bind(total_usage_limit)
        .bind(usage_per_user)
        .bind(current_usage_count)
        .bind(voucher.validity.valid_from().as_datetime())
        .bind(voucher.validity.valid_until().as_datetime())
        .bind(voucher.is_active)
        .bind(voucher.created_at.as_datetime())
        .bind(voucher.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Failed to insert voucher", &voucher.coupon_code, e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, DomainError> {
        let row: Option<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE id = $1",
            VOUCHER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch voucher", e))?;

        row.map(Voucher::try_from).transpose()
    }

    async fn find_by_code(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError> {
        let row: Option<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE vendor_id = $1 AND coupon_code = $2",
            VOUCHER_COLUMNS
        ))
        .bind(vendor_id.as_str())
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch voucher by code", e))?;

        row.map(Voucher::try_from).transpose()
    }

    async fn code_exists(
        &self,
        vendor_id: &VendorId,
        code: &CouponCode,
        excluding: Option<&VoucherId>,
    ) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM vouchers
                WHERE vendor_id = $1 AND coupon_code = $2
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(vendor_id.as_str())
        .bind(code.as_str())
        .bind(excluding.map(|id| *id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check coupon code", e))?;

        Ok(exists)
    }

    async fn list_by_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Voucher>, DomainError> {
        let rows: Vec<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE vendor_id = $1 ORDER BY created_at DESC",
            VOUCHER_COLUMNS
        ))
        .bind(vendor_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list vendor vouchers", e))?;

        rows.into_iter().map(Voucher::try_from).collect()
    }

    async fn list_all_ids(&self) -> Result<Vec<VoucherId>, DomainError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM vouchers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list voucher ids", e))?;

        Ok(ids.into_iter().map(VoucherId::from_uuid).collect())
    }

    async fn list_expired_before(&self, cutoff: Timestamp) -> Result<Vec<Voucher>, DomainError> {
        let rows: Vec<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE valid_until < $1 ORDER BY valid_until",
            VOUCHER_COLUMNS
        ))
        .bind(cutoff.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list expired vouchers", e))?;

        rows.into_iter().map(Voucher::try_from).collect()
    }
}
