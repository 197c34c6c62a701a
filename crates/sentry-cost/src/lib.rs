//! Sentry Cost Tracker (C8): append-only per-call cost accounting, period
//! roll-ups, budget utilization, and threshold alerting.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod tracker;
pub mod types;

pub use error::{CostError, CostResult};
pub use tracker::CostTracker;
pub use types::{BudgetConfig, BudgetNotification, CostEntry, CostSummary, Period, Utilization};
