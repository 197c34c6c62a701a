//! Sentry Model Router (C9): complexity classification, ordered
//! candidate selection, health-aware fallback dispatch, and streaming
//! pass-through.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod classify;
pub mod router;
pub mod types;

pub use classify::classify_complexity;
pub use router::ModelRouter;
pub use types::{Complexity, RoutingConfig, RoutingRules};
