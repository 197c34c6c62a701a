//! Approval Queue (C10) and Execution/Undo Manager (C11) ingress
//! operations: the boundary between a router-detected dangerous action
//! and the human approve/deny decision it waits on.

use sentry_approval::{ApprovalError, ApprovalRequest, Category, HistoryFilter, UndoAvailability, UndoTicket};
use sentry_core::{ApprovalRequestId, ErrorKind, GatewayError, GatewayResult, OwnerId, SessionId};
use serde_json::Value;

use crate::gateway::Gateway;

fn map_approval_error(err: ApprovalError) -> GatewayError {
    match err {
        ApprovalError::NotFound(id) => GatewayError::not_found("approval_not_found", format!("approval request {id} not found")),
        ApprovalError::InvalidState(id) => GatewayError::conflict("approval_not_pending", format!("approval request {id} is not pending")),
        ApprovalError::NotApproved(id) => GatewayError::conflict("approval_not_approved", format!("approval request {id} has not been approved")),
        ApprovalError::AlreadyExecuted(id) => GatewayError::conflict("approval_already_executed", format!("approval request {id} has already been executed")),
        ApprovalError::NoUndoTicket(id) => GatewayError::not_found("no_undo_ticket", format!("no undo ticket for approval request {id}")),
        ApprovalError::UndoWindowClosed(id) => GatewayError::conflict("undo_window_closed", format!("undo window for approval request {id} has closed")),
        other => GatewayError::new(ErrorKind::Dependency, "approval_error", other.to_string()),
    }
}

impl Gateway {
    /// Submit a candidate action for risk scoring and, if it clears no
    /// auto-approval rule, queue it pending a human decision.
    pub async fn request_approval(
        &self,
        category: Category,
        operation: impl Into<String>,
        action_body: impl Into<String>,
        context_text: impl Into<String>,
        session_id: SessionId,
        owner: Option<OwnerId>,
        metadata: Option<Value>,
    ) -> ApprovalRequest {
        self.approvals.create(category, operation, action_body, context_text, session_id, owner, metadata, None).await
    }

    /// Every request still awaiting a decision.
    #[must_use]
    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.approvals.pending()
    }

    /// Decided and expired requests matching `filter`.
    #[must_use]
    pub fn approval_history(&self, filter: &HistoryFilter) -> Vec<ApprovalRequest> {
        self.approvals.history(filter)
    }

    /// Approve `id`. When `remember` is set, installs an auto-approval
    /// rule covering this category/operation/risk ceiling going forward.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Conflict`] if the request is not pending.
    pub async fn approve_request(&self, id: ApprovalRequestId, actor: Option<OwnerId>, remember: bool) -> GatewayResult<ApprovalRequest> {
        self.approvals.approve(id, actor, remember).await.map_err(map_approval_error)
    }

    /// Deny `id`, with an optional human-readable reason.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Conflict`] if the request is not pending.
    pub async fn deny_request(&self, id: ApprovalRequestId, actor: Option<OwnerId>, reason: Option<String>) -> GatewayResult<ApprovalRequest> {
        self.approvals.deny(id, actor, reason).await.map_err(map_approval_error)
    }

    /// Run the approved action through the sandboxed executor, opening
    /// an undo window if the executor returned a compensation id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Conflict`] if `id` was never approved or
    /// has already executed.
    pub async fn execute_approved(&self, id: ApprovalRequestId) -> GatewayResult<Option<UndoTicket>> {
        self.execution.execute(id).await.map_err(map_approval_error)
    }

    /// Whether `id`'s execution can still be undone.
    #[must_use]
    pub fn undo_availability(&self, id: ApprovalRequestId) -> UndoAvailability {
        self.execution.can_undo(id)
    }

    /// Reverse an executed action's side effect, if its undo window is
    /// still open.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotFound`] if no undo ticket exists, or
    /// [`ErrorKind::Conflict`] if its window has closed.
    pub async fn undo_execution(&self, id: ApprovalRequestId) -> GatewayResult<()> {
        self.execution.undo(id).await.map_err(map_approval_error)
    }
}
