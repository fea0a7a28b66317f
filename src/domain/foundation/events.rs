//! Lifecycle event plumbing shared by every voucher event.
//!
//! Events are serialized into an [`EventEnvelope`] before they leave the
//! domain. The envelope carries the routing key (`event_type`), the
//! aggregate it concerns, and the caller context copied from the command.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::{DomainError, ErrorCode, Timestamp};

/// Implemented by anything that can be published as a lifecycle event.
pub trait DomainEvent: Send + Sync {
    /// Dotted routing key ending in a version, e.g. `voucher.used.v1`.
    fn event_type(&self) -> &'static str;

    fn aggregate_id(&self) -> String;

    fn aggregate_type(&self) -> &'static str;

    fn occurred_at(&self) -> Timestamp;
}

/// Per-envelope id; sinks use it to drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller context attached to an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Id of the user, vendor or admin that issued the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// "USER", "VENDOR" or "ADMIN".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Serialized event as handed to an [`EventPublisher`](crate::ports::EventPublisher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    /// Parsed from the `.vN` suffix of `event_type`; 1 when absent.
    pub schema_version: u32,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            event_id: EventId::new(),
            schema_version: schema_version_of(&event_type),
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Wraps a domain event, using its serde form as the payload.
    pub fn from_event<E>(event: &E) -> Result<Self, DomainError>
    where
        E: DomainEvent + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("cannot serialize {}: {}", event.event_type(), e),
            )
        })?;

        let mut envelope = Self::new(
            event.event_type(),
            event.aggregate_id(),
            event.aggregate_type(),
            payload,
        );
        envelope.occurred_at = event.occurred_at();
        Ok(envelope)
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.metadata.actor = Some(actor.into());
        self
    }

    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.trace_id = Some(id.into());
        self
    }

    /// Decodes the payload back into a typed event.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

fn schema_version_of(event_type: &str) -> u32 {
    event_type
        .rsplit_once(".v")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_version_comes_from_suffix() {
        assert_eq!(schema_version_of("voucher.used.v2"), 2);
        assert_eq!(schema_version_of("voucher.admin.bulk_updated.v10"), 10);
        assert_eq!(schema_version_of("voucher.used"), 1);
        assert_eq!(schema_version_of("voucher.used.vX"), 1);
    }

    #[test]
    fn metadata_omits_unset_fields() {
        let meta = EventMetadata {
            actor: Some("ADMIN".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, json!({"actor": "ADMIN"}));
    }

    #[test]
    fn envelope_defaults_and_builders() {
        let envelope = EventEnvelope::new(
            "voucher.deleted.v1",
            "v-1",
            "Voucher",
            json!({"coupon_code": "SUMMER25"}),
        )
        .with_correlation_id("req-1")
        .with_user_id("vendor-9")
        .with_actor("VENDOR");

        assert_eq!(envelope.schema_version, 1);
        assert_eq!(envelope.payload["coupon_code"], "SUMMER25");
        assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("req-1"));
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("vendor-9"));
        assert_eq!(envelope.metadata.actor.as_deref(), Some("VENDOR"));
        assert!(envelope.metadata.trace_id.is_none());
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }
}
