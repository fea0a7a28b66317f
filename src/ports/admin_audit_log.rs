//! Administrative audit log port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, VoucherId};
use crate::domain::voucher::AdminAuditEntry;

/// Append-only store for administrative audit entries.
#[async_trait]
pub trait AdminAuditLog: Send + Sync {
    /// Append an entry.
    async fn append(&self, entry: &AdminAuditEntry) -> Result<(), DomainError>;

    /// Most recent entries, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<AdminAuditEntry>, DomainError>;

    /// Entries that reference a voucher, newest first.
    ///
    /// Still returns entries after the voucher itself was force-deleted.
    async fn list_for_voucher(
        &self,
        voucher_id: &VoucherId,
    ) -> Result<Vec<AdminAuditEntry>, DomainError>;
}
