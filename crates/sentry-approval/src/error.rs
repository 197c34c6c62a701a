//! Error types for the Approval Queue and Execution/Undo Manager.

use sentry_core::ApprovalRequestId;
use thiserror::Error;

/// Errors from approval and execution operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No approval request exists with this id.
    #[error("approval request not found: {0}")]
    NotFound(ApprovalRequestId),

    /// The request is not in the state the caller's transition requires
    /// (e.g. approving an already-denied request, or a concurrent
    /// approve/deny race where the second writer loses).
    #[error("approval request {0} is not pending")]
    InvalidState(ApprovalRequestId),

    /// `execute` was called for a request that was never approved.
    #[error("approval request {0} is not approved")]
    NotApproved(ApprovalRequestId),

    /// `execute` was called twice for the same request.
    #[error("approval request {0} has already been executed")]
    AlreadyExecuted(ApprovalRequestId),

    /// No undo ticket exists for this request (never executed, or
    /// already undone).
    #[error("no undo ticket for approval request {0}")]
    NoUndoTicket(ApprovalRequestId),

    /// The undo ticket's deadline has passed.
    #[error("undo window for approval request {0} has closed")]
    UndoWindowClosed(ApprovalRequestId),

    /// The sandboxed executor collaborator failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The undo compensation failed.
    #[error("undo failed: {0}")]
    UndoFailed(String),
}

/// Result type for approval and execution operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
