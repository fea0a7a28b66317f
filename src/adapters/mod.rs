//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - Process-local persistence for tests and embedded use
//! - `postgres` - PostgreSQL persistence
//! - `events` - Event publishers (in-memory capture, structured log)

pub mod events;
pub mod memory;
pub mod postgres;

pub use events::{InMemoryEventBus, TracingEventPublisher};
pub use memory::InMemoryVoucherStore;
pub use postgres::{PostgresAdminAuditLog, PostgresUsageLedger, PostgresVoucherRepository};
