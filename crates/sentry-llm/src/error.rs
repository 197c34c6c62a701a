//! Provider Adapter error types.

use thiserror::Error;

/// Errors internal to an adapter's own plumbing. Per the adapter's
/// never-raise contract, callers of [`crate::provider::LlmProvider::complete`]
/// never see this type directly — it is folded into an error-shaped
/// [`crate::types::ModelResponse`] instead. It exists so adapters have
/// a concrete type to build that response from, and so
/// [`crate::health::HealthCache`] (which does propagate failures) has
/// something to return.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential configured for this provider.
    #[error("API key not configured for {provider}")]
    ApiKeyNotConfigured {
        /// Provider name.
        provider: String,
    },

    /// The outbound HTTP call itself failed (DNS, connect, timeout).
    #[error("request to {provider} failed: {message}")]
    RequestFailed {
        /// Provider name.
        provider: String,
        /// Underlying failure description.
        message: String,
    },

    /// The provider responded but the body didn't parse as expected.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse {
        /// Provider name.
        provider: String,
        /// Parse failure description.
        message: String,
    },

    /// The requested model isn't in this provider's catalog.
    #[error("model not supported: {model}")]
    ModelNotSupported {
        /// Model name.
        model: String,
    },

    /// A streaming adapter failed mid-stream.
    #[error("streaming error: {0}")]
    StreamingError(String),

    /// Operation requires streaming support this adapter doesn't implement.
    #[error("{provider} does not support streaming")]
    StreamingUnsupported {
        /// Provider name.
        provider: String,
    },
}

impl LlmError {
    /// Human-readable message suitable for [`crate::types::ModelResponse::error`].
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Result type for provider adapter operations that are allowed to
/// propagate (health checks, catalog listing). `complete`/`complete_stream`
/// never return `Err` — see their doc comments.
pub type LlmResult<T> = Result<T, LlmError>;
