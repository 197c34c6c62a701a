//! Sentry Crypto - cryptographic primitives for the gateway's security
//! perimeter.
//!
//! "Cryptography over prompts" — every sensitive boundary (stored secrets,
//! paired-device identity, bearer sessions, the audit chain) is protected
//! by a concrete primitive in this crate, not by convention.
//!
//! - [`aead`]: AES-256-GCM credential encryption + Argon2id master-key
//!   derivation (Credential Store, C1).
//! - [`keypair`] / [`signature`]: Ed25519 device identity (Device Pairing,
//!   C2) and audit-entry signing (Audit Log, C16).
//! - [`hmac_token`]: HMAC-SHA256 bearer-session signing (Session
//!   Authenticator, C2).
//! - [`hash`]: BLAKE3 content hashing (Prompt Cache keys, audit
//!   chain-linking).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod aead;
pub mod error;
pub mod hash;
pub mod hmac_token;
pub mod keypair;
pub mod signature;

pub use aead::{KdfParams, MasterKey, Sealed};
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use hmac_token::HmacKey;
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
