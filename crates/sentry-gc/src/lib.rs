//! Sentry GC: the periodic sweep that reclaims expired state from
//! sessions, caches, and the approval/undo lifecycle (C14).
//!
//! This crate defines the seam ([`GcTarget`]) rather than depending on
//! the components it sweeps; the gateway binary wires concrete
//! sessions/cache/approval-queue adapters in at startup, the same way
//! it supplies a `SandboxedExecutor` to the Execution/Undo Manager.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod scheduler;
pub mod types;

pub use error::{GcError, GcResult};
pub use scheduler::{spawn_sweeper, GcScheduler, GcTarget, GcTargets, DEFAULT_SWEEP_INTERVAL, HISTORY_CAPACITY};
pub use types::{GcRunRecord, GcTrigger};
