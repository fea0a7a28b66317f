//! In-memory event bus.
//!
//! Keeps every published envelope so tests can assert on them. It can be
//! switched into a failing mode to simulate an unavailable notification
//! sink.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// ApplyVoucherHandler::new(store, bus.clone()).handle(cmd, meta).await?;
/// assert!(bus.has_event("voucher.used.v1"));
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    published: RwLock<Vec<EventEnvelope>>,
    failing: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `publish` fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.read().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.read().iter().any(|e| e.event_type == event_type)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("notification sink unavailable for {}", event.event_type),
            ));
        }

        self.published
            .write()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "event bus lock poisoned"))?
            .push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, "v-1", "Voucher", json!({}))
    }

    #[tokio::test]
    async fn records_and_filters_by_type() {
        let bus = InMemoryEventBus::new();
        bus.publish_all(vec![
            envelope("voucher.used.v1"),
            envelope("voucher.deleted.v1"),
            envelope("voucher.used.v1"),
        ])
        .await
        .unwrap();

        assert_eq!(bus.event_count(), 3);
        assert_eq!(bus.events_of_type("voucher.used.v1").len(), 2);
        assert!(bus.has_event("voucher.deleted.v1"));
        assert!(!bus.has_event("voucher.created.v1"));
    }

    #[tokio::test]
    async fn failing_mode_rejects_and_records_nothing() {
        let bus = InMemoryEventBus::new();
        bus.set_failing(true);
        assert!(bus.publish(envelope("voucher.used.v1")).await.is_err());
        assert_eq!(bus.event_count(), 0);

        bus.set_failing(false);
        bus.publish(envelope("voucher.used.v1")).await.unwrap();
        assert_eq!(bus.event_count(), 1);
    }
}
