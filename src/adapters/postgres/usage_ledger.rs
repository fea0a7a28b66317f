//! PostgreSQL implementation of UsageLedger.
//!
//! A transaction sets `lock_timeout` locally and takes voucher row locks
//! with `SELECT ... FOR UPDATE`. The counter increment is additionally
//! guarded in SQL so the stored count can never pass `total_usage_limit`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, Timestamp, UserId, VendorId, VoucherId, VoucherUsageId,
};
use crate::domain::voucher::{CouponCode, FraudFlag, IneligibleReason, Voucher, VoucherUsage};
use crate::ports::{LedgerTransaction, UsageLedger};

use super::rows::{
    applicability_columns, count_column, db_error, limit_column, write_error, UsageRow,
    VoucherRow, USAGE_COLUMNS, VOUCHER_COLUMNS,
};

/// PostgreSQL implementation of the UsageLedger port.
#[derive(Clone)]
pub struct PostgresUsageLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresUsageLedger {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FraudFlagRow {
    usage_id: Uuid,
    voucher_id: Uuid,
    reason: String,
    flagged_by: String,
    flagged_at: DateTime<Utc>,
}

impl From<FraudFlagRow> for FraudFlag {
    fn from(row: FraudFlagRow) -> Self {
        FraudFlag {
            usage_id: VoucherUsageId::from_uuid(row.usage_id),
            voucher_id: VoucherId::from_uuid(row.voucher_id),
            reason: row.reason,
            flagged_by: row.flagged_by,
            flagged_at: Timestamp::from_datetime(row.flagged_at),
        }
    }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageLedger for PostgresUsageLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // SET does not accept bind parameters; the value is an integer we format ourselves.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to set lock timeout", e))?;

        Ok(Box::new(PostgresLedgerTransaction { tx }))
    }

    async fn find_usage(&self, id: &VoucherUsageId) -> Result<Option<VoucherUsage>, DomainError> {
        let row: Option<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_usages WHERE id = $1",
            USAGE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch voucher usage", e))?;

        row.map(VoucherUsage::try_from).transpose()
    }

    async fn count_usages(&self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = $1")
                .bind(voucher_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Failed to count voucher usages", e))?;

        Ok(count.max(0) as u64)
    }

    async fn list_usages_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_usages WHERE voucher_id = $1 ORDER BY applied_at DESC",
            USAGE_COLUMNS
        ))
        .bind(voucher_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list voucher usages", e))?;

        rows.into_iter().map(VoucherUsage::try_from).collect()
    }

    async fn list_usages_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_usages WHERE user_id = $1 ORDER BY applied_at DESC",
            USAGE_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list user usages", e))?;

        rows.into_iter().map(VoucherUsage::try_from).collect()
    }

    async fn count_user_redemptions(
        &self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = $1 AND user_id = $2",
        )
        .bind(voucher_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count user redemptions", e))?;

        Ok(to_count(count))
    }

    async fn flag_usage(&self, flag: &FraudFlag) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO voucher_fraud_flags (usage_id, voucher_id, reason, flagged_by, flagged_at)
            SELECT id, voucher_id, $2, $3, $4 FROM voucher_usages WHERE id = $1
            ON CONFLICT (usage_id) DO UPDATE SET
                reason = EXCLUDED.reason,
                flagged_by = EXCLUDED.flagged_by,
                flagged_at = EXCLUDED.flagged_at
            "#,
        )
        .bind(flag.usage_id.as_uuid())
        .bind(&flag.reason)
        .bind(&flag.flagged_by)
        .bind(flag.flagged_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to flag voucher usage", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::UsageNotFound,
                format!("Voucher usage not found: {}", flag.usage_id),
            )
            .with_detail("usage_id", flag.usage_id.to_string()));
        }
        Ok(())
    }

    async fn list_fraud_flags(&self, voucher_id: &VoucherId) -> Result<Vec<FraudFlag>, DomainError> {
        let rows: Vec<FraudFlagRow> = sqlx::query_as(
            r#"
            SELECT usage_id, voucher_id, reason, flagged_by, flagged_at
            FROM voucher_fraud_flags
            WHERE voucher_id = $1
            ORDER BY flagged_at DESC
            "#,
        )
        .bind(voucher_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list fraud flags", e))?;

        Ok(rows.into_iter().map(FraudFlag::from).collect())
    }
}

/// A ledger transaction over one pooled connection.
struct PostgresLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn lock_voucher(&mut self, id: &VoucherId) -> Result<Option<Voucher>, DomainError> {
        let row: Option<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE id = $1 FOR UPDATE",
            VOUCHER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock voucher", e))?;
        debug!(voucher_id = %id, found = row.is_some(), "voucher row locked");

        row.map(Voucher::try_from).transpose()
    }

    async fn lock_voucher_by_code(
        &mut self,
        vendor_id: &VendorId,
        code: &CouponCode,
    ) -> Result<Option<Voucher>, DomainError> {
        let row: Option<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE vendor_id = $1 AND coupon_code = $2 FOR UPDATE",
            VOUCHER_COLUMNS
        ))
        .bind(vendor_id.as_str())
        .bind(code.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock voucher by code", e))?;

        row.map(Voucher::try_from).transpose()
    }

    async fn lock_vouchers(&mut self, ids: &[VoucherId]) -> Result<Vec<Voucher>, DomainError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows: Vec<VoucherRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vouchers WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            VOUCHER_COLUMNS
        ))
        .bind(uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to lock vouchers", e))?;

        rows.into_iter().map(Voucher::try_from).collect()
    }

    async fn count_user_redemptions(
        &mut self,
        voucher_id: &VoucherId,
        user_id: &UserId,
    ) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = $1 AND user_id = $2",
        )
        .bind(voucher_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to count user redemptions", e))?;

        Ok(to_count(count))
    }

    async fn count_usages(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = $1")
                .bind(voucher_id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to count voucher usages", e))?;

        Ok(count.max(0) as u64)
    }

    async fn list_usages(
        &mut self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<VoucherUsage>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_usages WHERE voucher_id = $1 ORDER BY applied_at",
            USAGE_COLUMNS
        ))
        .bind(voucher_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to list voucher usages", e))?;

        rows.into_iter().map(VoucherUsage::try_from).collect()
    }

    async fn record_usage(&mut self, usage: &VoucherUsage) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO voucher_usages (
                id, voucher_id, user_id, booking_id, original_amount,
                discount_amount, final_amount, service_type, service_id, applied_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(usage.id.as_uuid())
        .bind(usage.voucher_id.as_uuid())
        .bind(usage.user_id.as_str())
        .bind(usage.booking_id.as_str())
        .bind(usage.original_amount.cents())
        .bind(usage.discount_amount.cents())
        .bind(usage.final_amount.cents())
        .bind(usage.service_type.as_str())
        .bind(usage.service_id.as_str())
        .bind(usage.applied_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to record voucher usage", e))?;

        Ok(())
    }

    async fn increment_usage_counter(&mut self, voucher_id: &VoucherId) -> Result<u32, DomainError> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE vouchers
            SET current_usage_count = current_usage_count + 1,
                updated_at = NOW()
            WHERE id = $1
              AND (total_usage_limit IS NULL OR current_usage_count < total_usage_limit)
            RETURNING current_usage_count
            "#,
        )
        .bind(voucher_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to increment usage counter", e))?;

        match updated {
            Some(count) => Ok(to_count(i64::from(count))),
            None => {
                let reason = IneligibleReason::GlobalLimitExceeded;
                Err(DomainError::new(reason.code(), reason.message())
                    .with_detail("voucher_id", voucher_id.to_string()))
            }
        }
    }

    async fn save_voucher(&mut self, voucher: &Voucher) -> Result<(), DomainError> {
        let (applicable_for, service_types, service_ids) =
            applicability_columns(&voucher.applicability);
        let total_usage_limit = limit_column("total_usage_limit", voucher.limits.total())?;
        let usage_per_user = count_column("usage_per_user", voucher.limits.per_user())?;
        let current_usage_count = count_column("current_usage_count", voucher.current_usage_count)?;

        let result = sqlx::query(
            r#"
            UPDATE vouchers SET
                coupon_code = $2,
                title = $3,
                description = $4,
                discount_type = $5,
                discount_value = $6,
                max_discount_amount = $7,
                min_order_value = $8,
                applicable_for = $9,
                applicable_service_types = $10,
                applicable_service_ids = $11,
                total_usage_limit = $12,
                usage_per_user = $13,
                current_usage_count = $14,
                valid_from = $15,
                valid_until = $16,
                is_active = $17,
                updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(voucher.id.as_uuid())
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
        .bind(voucher.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_error("Failed to update voucher", &voucher.coupon_code, e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::VoucherNotFound,
                format!("Voucher not found: {}", voucher.id),
            )
            .with_detail("voucher_id", voucher.id.to_string()));
        }
        Ok(())
    }

    async fn delete_voucher(&mut self, voucher_id: &VoucherId) -> Result<u64, DomainError> {
        let removed = self.count_usages(voucher_id).await?;

        // Usage rows and fraud flags go with the voucher through ON DELETE CASCADE.
        sqlx::query("DELETE FROM vouchers WHERE id = $1")
            .bind(voucher_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete voucher", e))?;

        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("Failed to roll back transaction", e))
    }
}
