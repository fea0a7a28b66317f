//! In-memory persistence adapters.
//!
//! `InMemoryVoucherStore` implements `VoucherRepository`, `UsageLedger` and
//! `AdminAuditLog` over shared process memory. It backs the test suites and
//! the engine's in-memory mode.

mod ledger;
mod store;

pub use store::{InMemoryVoucherStore, DEFAULT_LOCK_TIMEOUT};
