//! Sentry Trust: behavioral health signals (C12) and the phased
//! rollout gate they feed (C13).
//!
//! Neither component has a direct analogue elsewhere in the gateway;
//! both are built on the same primitives the rest of the workspace
//! uses for periodic, audited, append-only state: a `Mutex`-guarded
//! ledger, a `CancellationToken` sweep, and `AuditLog`/`EventBus`
//! fan-out for every state change.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod monitor;
pub mod rollout;
pub mod types;

pub use error::{TrustError, TrustResult};
pub use monitor::{spawn_sweeper, AlertKind, TrustMonitor};
pub use rollout::RolloutController;
pub use types::{
    EligibilityProfile, EligibilityResult, FreezeState, RegressionSeverity, RolloutPhase, RolloutState,
    SignalLevel, SignalType, TrustRegressionEvent, TrustSignalMeasurement,
};
