//! Request context for correlation and tracing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request context carried through a gateway operation for correlation
/// across logs, audit entries, and device-paired sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Correlation ID shared across a chain of sub-requests.
    pub correlation_id: Uuid,
    /// Parent request ID if this is a sub-request.
    pub parent_id: Option<Uuid>,
    /// Paired device's session ID, if the request arrived authenticated.
    pub session_id: Option<Uuid>,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Component that created this context (e.g. `"router"`, `"pipeline"`).
    pub source: String,
    /// Operation being performed (e.g. `"route_prompt"`).
    pub operation: Option<String>,
    /// Additional metadata (provider id, request kind, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RequestContext {
    /// Create a new request context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            parent_id: None,
            session_id: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a child context that inherits correlation info.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.request_id),
            session_id: self.session_id,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: self.metadata.clone(),
        }
    }

    /// Set the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the session ID.
    #[must_use]
    pub fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Add metadata.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Build a tracing span carrying this context's correlation fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            source = %self.source,
            operation = self.operation.as_deref(),
        )
    }

    /// Whether this context has a parent.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Short identifier for log lines.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.request_id.to_string()[..8].to_string()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Guard that enters the context's span on creation and logs completion
/// (with elapsed time) on drop.
pub struct RequestGuard {
    context: RequestContext,
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl RequestGuard {
    /// Enter the span for `context`, logging the start.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("request started");
        Self { context, span }
    }

    /// The wrapped request context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_matching_correlation_id() {
        let ctx = RequestContext::new("router");
        assert_eq!(ctx.source, "router");
        assert_eq!(ctx.request_id, ctx.correlation_id);
        assert!(ctx.parent_id.is_none());
        assert!(ctx.session_id.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let session = Uuid::new_v4();
        let correlation = Uuid::new_v4();

        let ctx = RequestContext::new("pipeline")
            .with_correlation_id(correlation)
            .with_session_id(session)
            .with_operation("compress_context")
            .with_metadata("provider", "anthropic");

        assert_eq!(ctx.correlation_id, correlation);
        assert_eq!(ctx.session_id, Some(session));
        assert_eq!(ctx.operation, Some("compress_context".to_string()));
        assert_eq!(ctx.metadata.get("provider"), Some(&"anthropic".to_string()));
    }

    #[test]
    fn child_inherits_correlation_and_session() {
        let session = Uuid::new_v4();
        let parent = RequestContext::new("router").with_session_id(session).with_metadata("inherited", "yes");

        let child = parent.child("pipeline");

        assert_ne!(child.request_id, parent.request_id);
        assert_eq!(child.correlation_id, parent.correlation_id);
        assert_eq!(child.parent_id, Some(parent.request_id));
        assert_eq!(child.session_id, Some(session));
        assert_eq!(child.metadata.get("inherited"), Some(&"yes".to_string()));
    }

    #[test]
    fn elapsed_ms_advances() {
        let ctx = RequestContext::new("router");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn short_id_is_eight_chars() {
        let ctx = RequestContext::new("router");
        assert_eq!(ctx.short_id().len(), 8);
    }

    #[test]
    fn round_trips_through_json() {
        let ctx = RequestContext::new("router").with_operation("route_prompt").with_metadata("provider", "local");

        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.source, "router");
        assert_eq!(parsed.operation, Some("route_prompt".to_string()));
    }
}
