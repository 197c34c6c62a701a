//! Sentry Auth - Credential Store (C1) and Device Pairing & Session
//! Authenticator (C2).
//!
//! Three independent services share this crate because they sit behind
//! the same security perimeter and are usually constructed together at
//! startup: [`credential::CredentialStore`] (encrypted secrets),
//! [`pairing::DevicePairing`] (Ed25519 challenge/response enrollment),
//! and [`session::SessionAuthenticator`] (HMAC-signed bearer tokens).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod credential;
pub mod error;
pub mod pairing;
pub mod session;

pub use credential::{Credential, CredentialStore, CredentialSummary, Service};
pub use error::{AuthError, AuthResult};
pub use pairing::{DevicePairing, Fingerprint, PairedDevice, PairingChallenge};
pub use session::{AccessClaims, SessionAuthenticator, SessionOperation, TokenPair};
