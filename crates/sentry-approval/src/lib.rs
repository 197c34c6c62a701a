//! Sentry Approval: risk-classified human-in-the-loop approvals (C10)
//! and bounded-window reversible execution of the actions they gate
//! (C11).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod execution;
pub mod queue;
pub mod risk;
pub mod types;

pub use error::{ApprovalError, ApprovalResult};
pub use execution::{ExecutionManager, ExecutionReceipt, SandboxedExecutor, UndoAvailability, UndoTicket};
pub use queue::{spawn_sweeper, ApprovalQueue};
pub use risk::{RiskScorer, RiskScorerConfig};
pub use types::{
    ApprovalAuditEntry, ApprovalRequest, ApprovalStatus, AuditAction, AutoApprovalRule, Category, HistoryFilter,
};
