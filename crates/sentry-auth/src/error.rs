//! Error types for the Credential Store and Session Authenticator.

use thiserror::Error;

/// Errors from credential, pairing, and session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential store has no master key loaded.
    #[error("credential store not initialized")]
    NotInitialized,

    /// The requested credential, device, challenge, or session was not
    /// found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A credential with this name already exists for the owner.
    #[error("duplicate credential name: {0}")]
    DuplicateName(String),

    /// AEAD tag mismatch on decryption.
    #[error("decryption failed: authentication tag mismatch")]
    DecryptError,

    /// The owner already has the maximum of 10 paired devices.
    #[error("device cap exceeded: an owner may pair at most 10 devices")]
    DeviceCapExceeded,

    /// The pairing challenge has expired.
    #[error("pairing challenge expired")]
    ChallengeExpired,

    /// The device's signature over the challenge nonce did not verify.
    #[error("invalid pairing signature")]
    InvalidSignature,

    /// The bearer token failed to parse or its signature did not verify.
    #[error("invalid token")]
    InvalidToken,

    /// The access token has expired.
    #[error("access token expired")]
    TokenExpired,

    /// The refresh token has already been consumed or explicitly
    /// revoked.
    #[error("refresh token revoked")]
    TokenRevoked,

    /// The operation requires `mfa_verified=true` and the token does not
    /// carry it.
    #[error("operation requires MFA verification")]
    MfaRequired,

    /// Underlying storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] sentry_storage::StorageError),

    /// Underlying cryptographic primitive failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] sentry_crypto::CryptoError),
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
