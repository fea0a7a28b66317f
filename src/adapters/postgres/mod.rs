//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresVoucherRepository` - Voucher inserts and catalog reads
//! - `PostgresUsageLedger` - Row-locked redemption accounting
//! - `PostgresAdminAuditLog` - Administrative audit trail

mod audit_log;
mod rows;
mod usage_ledger;
mod voucher_repository;

pub use audit_log::PostgresAdminAuditLog;
pub use usage_ledger::PostgresUsageLedger;
pub use voucher_repository::PostgresVoucherRepository;
