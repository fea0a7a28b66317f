//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `VoucherRepository` - Voucher creation and unlocked catalog reads
//! - `UsageLedger` / `LedgerTransaction` - Row-locked redemption accounting
//! - `AdminAuditLog` - Administrative audit trail
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Best-effort lifecycle event delivery

mod admin_audit_log;
mod event_publisher;
mod usage_ledger;
mod voucher_repository;

pub use admin_audit_log::AdminAuditLog;
pub use event_publisher::EventPublisher;
pub use usage_ledger::{LedgerTransaction, UsageLedger};
pub use voucher_repository::VoucherRepository;
