//! Sentry Core - foundation types shared by every gateway component.
//!
//! This crate provides the identifiers, timestamps, risk/permission
//! vocabulary, and error taxonomy that the rest of the workspace builds on.
//! It has no knowledge of providers, approvals, or storage engines; it is
//! the vocabulary those crates speak.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod conversation;
pub mod error;
pub mod ids;
pub mod retry;
pub mod risk;
pub mod time;

pub use conversation::{ConversationTurn, Role, estimate_tokens};
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use ids::{
    ApprovalRequestId, AuditEntryId, CostEntryId, CredentialId, DeviceId, ModelSpec, OwnerId,
    RegressionId, SessionId, TrustSignalId, UndoTicketId,
};
pub use retry::{RetryConfig, RetryOutcome, retry};
pub use risk::{Permission, RiskLevel};
pub use time::Timestamp;
