//! Startup failure modes and their process exit codes.

use thiserror::Error;

/// A failure that prevents the gateway from starting, distinct from the
/// per-request [`sentry_core::GatewayError`] the running daemon returns
/// to callers. Each variant maps to one of the process exit codes.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The config file failed to load or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The credential store's seed material is missing or the store
    /// otherwise failed to initialize.
    #[error("credential store not initialized or corrupt: {0}")]
    CredentialStore(String),

    /// A durability backend the gateway depends on could not be reached.
    #[error("storage unreachable: {0}")]
    Storage(String),
}

impl StartupError {
    /// The process exit code this failure should produce, per the
    /// gateway's startup contract: 2 for configuration, 3 for an
    /// uninitialized or corrupt credential store, 4 for unreachable
    /// storage.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::CredentialStore(_) => 3,
            Self::Storage(_) => 4,
        }
    }
}

impl From<sentry_config::ConfigError> for StartupError {
    fn from(err: sentry_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<sentry_auth::AuthError> for StartupError {
    fn from(err: sentry_auth::AuthError) -> Self {
        Self::CredentialStore(err.to_string())
    }
}
