//! Error taxonomy shared by every gateway crate.
//!
//! Each crate defines its own `thiserror` enum for its own failure modes;
//! every variant maps onto one of the kinds below via [`ErrorKind`] so the
//! audit and ingress layers can apply the propagation policy from the
//! error-handling design uniformly, without matching on crate-specific
//! types.

use serde::{Deserialize, Serialize};

/// The error-kind taxonomy from the error-handling design. Kinds, never
/// concrete types: every crate-local error variant reports one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreachable provider base URL, missing key material, malformed
    /// routing rules. Fatal on startup; never during operation.
    Configuration,
    /// Invalid/expired token, missing MFA, untrusted device, exceeded
    /// device cap.
    Authentication,
    /// Request targets a resource the caller does not own.
    Authorization,
    /// Malformed request body, unknown enum, value out of range.
    Validation,
    /// Referenced id unknown.
    NotFound,
    /// Duplicate name, double transition on approval.
    Conflict,
    /// Provider HTTP 5xx, timeout, malformed response.
    Dependency,
    /// Batcher at concurrency cap, cache full, approval expired — a
    /// documented outcome, not a failure.
    Resource,
    /// A stop-level trust signal halted rollout.
    TrustHalt,
}

impl ErrorKind {
    /// Whether an error of this kind must be written to the audit log.
    ///
    /// Per the propagation policy: every security-relevant error is
    /// audited; validation and not-found errors are not.
    #[must_use]
    pub fn is_audited(self) -> bool {
        !matches!(self, Self::Validation | Self::NotFound)
    }
}

/// A structured error record crossing the boundary to a caller:
/// `{kind, code, message, details?}`.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct GatewayError {
    /// The taxonomy kind.
    pub kind: ErrorKind,
    /// A short machine-readable code, e.g. `credential_not_found`.
    pub code: String,
    /// A human-readable message. Never includes secret material.
    pub message: String,
    /// Optional structured detail payload.
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    /// Build a new structured error.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured detail to this error.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shorthand for a [`ErrorKind::NotFound`] error.
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// Shorthand for a [`ErrorKind::Conflict`] error.
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, message)
    }

    /// Shorthand for a [`ErrorKind::Validation`] error.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }
}

/// Convenience alias for fallible gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_not_found_are_not_audited() {
        assert!(!ErrorKind::Validation.is_audited());
        assert!(!ErrorKind::NotFound.is_audited());
    }

    #[test]
    fn everything_else_is_audited() {
        assert!(ErrorKind::Authentication.is_audited());
        assert!(ErrorKind::Conflict.is_audited());
        assert!(ErrorKind::TrustHalt.is_audited());
    }
}
