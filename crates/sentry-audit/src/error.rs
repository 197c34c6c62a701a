//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur while writing or reading the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] sentry_storage::StorageError),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entry not found.
    #[error("audit entry not found: {entry_id}")]
    EntryNotFound {
        /// The entry ID that was not found.
        entry_id: String,
    },

    /// Chain integrity violation.
    #[error("chain integrity violation at entry {entry_id}: {reason}")]
    IntegrityViolation {
        /// The entry where violation was detected.
        entry_id: String,
        /// Why the chain is invalid.
        reason: String,
    },

    /// Invalid signature on entry.
    #[error("invalid signature on entry {entry_id}")]
    InvalidSignature {
        /// The entry with invalid signature.
        entry_id: String,
    },

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] sentry_crypto::CryptoError),

    /// Export failed.
    #[error("export error: {0}")]
    Export(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
