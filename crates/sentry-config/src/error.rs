//! Configuration error types.

use thiserror::Error;

/// Errors from loading, merging, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// The file that failed to read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A config file's TOML could not be parsed, or the merged tree could
    /// not be deserialized into [`crate::types::Config`].
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// The file (or `<merged config>`) that failed to parse.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A deserialized value failed a post-merge validation rule.
    #[error("invalid config field {field}: {message}")]
    ValidationError {
        /// The dotted field path.
        field: String,
        /// What's wrong with it.
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,

    /// A config file on Unix is readable/writable by group or other.
    #[error("config file {path} has insecure permissions {mode:o}, should be 0600")]
    InsecurePermissions {
        /// The file with the offending mode bits.
        path: String,
        /// The file's mode, masked to the permission bits.
        mode: u32,
    },

    /// The typed [`crate::types::Config`] defaults failed to round-trip
    /// through `toml::Value`. Every field in this crate serializes
    /// cleanly, so this indicates a bug rather than bad user input.
    #[error("internal config error: {0}")]
    Internal(String),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
