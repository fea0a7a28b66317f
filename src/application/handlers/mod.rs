//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.
//!
//! - `voucher` - Vendor-scoped catalog operations, redemption and queries
//! - `voucher_admin` - Administrative control surface

pub mod voucher;
pub mod voucher_admin;

#[cfg(test)]
pub(crate) mod test_fixtures;

use tracing::warn;

use crate::domain::foundation::{CommandMetadata, EventEnvelope};
use crate::domain::voucher::VoucherEvent;
use crate::ports::EventPublisher;

/// Publishes a lifecycle event after its transaction has committed.
///
/// Delivery is best-effort: serialization and publish failures are logged
/// and swallowed so they never undo or fail the originating operation.
pub(crate) async fn publish_best_effort(
    publisher: &dyn EventPublisher,
    metadata: &CommandMetadata,
    event: VoucherEvent,
) {
    let envelope = match EventEnvelope::from_event(&event) {
        Ok(envelope) => metadata.decorate(envelope),
        Err(err) => {
            warn!(error = %err, "failed to build lifecycle event");
            return;
        }
    };

    let event_type = envelope.event_type.clone();
    if let Err(err) = publisher.publish(envelope).await {
        warn!(event_type = %event_type, error = %err, "lifecycle event not delivered");
    }
}
