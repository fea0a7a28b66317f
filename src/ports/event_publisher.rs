//! EventPublisher port - Interface for publishing lifecycle events.
//!
//! The notification/audit collaborator sits behind this port. The engine
//! publishes after its transaction commits and treats delivery as
//! best-effort: a failed publish is logged and never undoes the operation.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing lifecycle events.
///
/// # Example
///
/// ```ignore
/// let envelope = EventEnvelope::from_event(&VoucherEvent::Used { .. })?;
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events in order.
    ///
    /// Adapters without batch support publish sequentially and stop at the
    /// first failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_publisher_is_object_safe() {
        fn _accepts_dyn(_publisher: &dyn EventPublisher) {}
    }
}
