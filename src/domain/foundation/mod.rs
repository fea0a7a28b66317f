//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, caller identity, event
//! infrastructure and error types that form the vocabulary of the
//! voucher engine.

mod auth;
mod command;
mod errors;
mod events;
mod ids;
mod money;
mod ownership;
mod percentage;
mod timestamp;

pub use auth::{AuthenticatedCaller, CallerRole};
pub use command::CommandMetadata;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{AuditEntryId, BookingId, ServiceId, UserId, VendorId, VoucherId, VoucherUsageId};
pub use money::Money;
pub use ownership::OwnedByVendor;
pub use percentage::DiscountPercent;
pub use timestamp::Timestamp;
