//! PostgreSQL implementation of AdminAuditLog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    AuditEntryId, DomainError, ErrorCode, Timestamp, VendorId, VoucherId, VoucherUsageId,
};
use crate::domain::voucher::{AdminAction, AdminAuditEntry};
use crate::ports::AdminAuditLog;

use super::rows::db_error;

#[derive(Clone)]
pub struct PostgresAdminAuditLog {
    pool: PgPool,
}

impl PostgresAdminAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    actor_id: String,
    reason: Option<String>,
    voucher_id: Option<Uuid>,
    vendor_id: Option<String>,
    usage_id: Option<Uuid>,
    affected: i64,
    snapshot: Option<JsonValue>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AdminAuditEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AdminAction::parse(&row.action).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid audit action: {}", row.action),
            )
        })?;
        let vendor_id = row
            .vendor_id
            .map(VendorId::new)
            .transpose()
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;

        Ok(AdminAuditEntry {
            id: AuditEntryId::from_uuid(row.id),
            action,
            actor_id: row.actor_id,
            reason: row.reason,
            voucher_id: row.voucher_id.map(VoucherId::from_uuid),
            vendor_id,
            usage_id: row.usage_id.map(VoucherUsageId::from_uuid),
            affected: row.affected.max(0) as u64,
            snapshot: row.snapshot,
            occurred_at: Timestamp::from_datetime(row.occurred_at),
        })
    }
}

const AUDIT_COLUMNS: &str =
    "id, action, actor_id, reason, voucher_id, vendor_id, usage_id, affected, snapshot, occurred_at";

#[async_trait]
impl AdminAuditLog for PostgresAdminAuditLog {
    async fn append(&self, entry: &AdminAuditEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO voucher_admin_audit (
                id, action, actor_id, reason, voucher_id, vendor_id,
                usage_id, affected, snapshot, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.action.as_str())
        .bind(&entry.actor_id)
        .bind(&entry.reason)
        .bind(entry.voucher_id.map(|id| *id.as_uuid()))
        .bind(entry.vendor_id.as_ref().map(|v| v.as_str().to_string()))
        .bind(entry.usage_id.map(|id| *id.as_uuid()))
        .bind(i64::try_from(entry.affected).unwrap_or(i64::MAX))
        .bind(&entry.snapshot)
        .bind(entry.occurred_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append audit entry", e))?;

        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AdminAuditEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_admin_audit ORDER BY occurred_at DESC LIMIT $1",
            AUDIT_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list audit entries", e))?;

        rows.into_iter().map(AdminAuditEntry::try_from).collect()
    }

    async fn list_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<AdminAuditEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT {} FROM voucher_admin_audit WHERE voucher_id = $1 ORDER BY occurred_at DESC",
            AUDIT_COLUMNS
        ))
        .bind(voucher_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list voucher audit entries", e))?;

        rows.into_iter().map(AdminAuditEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit_row(action: &str) -> AuditRow {
        AuditRow {
            id: Uuid::new_v4(),
            action: action.to_string(),
            actor_id: "ops-1".to_string(),
            reason: Some("chargebacks".to_string()),
            voucher_id: None,
            vendor_id: Some("vendor-1".to_string()),
            usage_id: None,
            affected: 3,
            snapshot: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn audit_row_maps_stored_action() {
        let entry = AdminAuditEntry::try_from(audit_row("suspend_vendor")).unwrap();
        assert_eq!(entry.action, AdminAction::SuspendVendor);
        assert_eq!(entry.vendor_id.as_ref().map(VendorId::as_str), Some("vendor-1"));
        assert_eq!(entry.affected, 3);
    }

    #[test]
    fn audit_row_rejects_unknown_action() {
        let err = AdminAuditEntry::try_from(audit_row("drop_tables")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_affected_reads_as_zero() {
        let row = AuditRow {
            affected: -5,
            ..audit_row("cleanup_expired")
        };
        assert_eq!(AdminAuditEntry::try_from(row).unwrap().affected, 0);
    }
}
