//! Command infrastructure for handlers.
//!
//! Every handler accepts a `CommandMetadata` carrying the authenticated
//! caller (if any) and request correlation context, instead of a growing
//! list of loose parameters.

use serde::{Deserialize, Serialize};

use super::{AuthenticatedCaller, DomainError, ErrorCode, EventEnvelope};

/// Metadata context for command and query handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// The caller executing this command. `None` for anonymous requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<AuthenticatedCaller>,

    /// Links related operations across a single request.
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,

    /// Distributed tracing span/trace ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

impl CommandMetadata {
    /// Creates metadata for an authenticated caller.
    pub fn new(caller: AuthenticatedCaller) -> Self {
        Self {
            caller: Some(caller),
            correlation_id: None,
            trace_id: None,
        }
    }

    /// Creates metadata for an unauthenticated request.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builder: Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builder: Add trace ID for distributed tracing.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Returns the caller or fails with `Unauthenticated`.
    pub fn caller(&self) -> Result<&AuthenticatedCaller, DomainError> {
        self.caller
            .as_ref()
            .ok_or_else(|| DomainError::new(ErrorCode::Unauthenticated, "Authentication required"))
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Propagates caller and correlation context onto an outgoing event.
    pub fn decorate(&self, mut envelope: EventEnvelope) -> EventEnvelope {
        if let Some(caller) = &self.caller {
            envelope = envelope
                .with_user_id(caller.id.clone())
                .with_actor(caller.role.actor_tag());
        }
        if let Some(id) = &self.correlation_id {
            envelope = envelope.with_correlation_id(id.clone());
        }
        if let Some(id) = &self.trace_id {
            envelope = envelope.with_trace_id(id.clone());
        }
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn anonymous_metadata_is_unauthenticated() {
        let err = CommandMetadata::anonymous().caller().unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }

    #[test]
    fn decorate_tags_actor_and_correlation() {
        let meta = CommandMetadata::new(AuthenticatedCaller::admin("ops-1"))
            .with_correlation_id("req-7");
        let envelope = meta.decorate(EventEnvelope::new(
            "voucher.admin.force_deleted.v1",
            "v-1",
            "Voucher",
            json!({}),
        ));

        assert_eq!(envelope.metadata.actor.as_deref(), Some("ADMIN"));
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("ops-1"));
        assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn decorate_leaves_anonymous_envelope_untagged() {
        let envelope = CommandMetadata::anonymous().decorate(EventEnvelope::new(
            "voucher.used.v1",
            "v-1",
            "Voucher",
            json!({}),
        ));
        assert!(envelope.metadata.actor.is_none());
    }
}
