//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur during telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A log directive or filter string was malformed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The global subscriber could not be installed.
    #[error("initialization error: {0}")]
    InitError(String),

    /// A file-logging sink could not be created.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
