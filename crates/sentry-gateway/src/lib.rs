//! Sentry Gateway: the assembled application. Every other `sentry-*`
//! crate defines one component (C1-C16); this crate wires them
//! together, bridges `sentry-config` into each component's constructor
//! arguments, and exposes the request-level operations a transport
//! (CLI, future RPC surface) calls into.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod gc_targets;
pub mod ingress_approvals;
pub mod ingress_chat;
pub mod ingress_credentials;
pub mod ingress_trust;

pub use error::StartupError;
pub use gateway::{Gateway, Sweepers};
pub use ingress_chat::ChatRequest;
