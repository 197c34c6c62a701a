//! Execution/Undo Manager (C11): bounded-window reversible execution of
//! approved actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sentry_audit::{AuditLog, EventType as AuditEventType, Severity};
use sentry_core::{ApprovalRequestId, Timestamp, UndoTicketId};
use sentry_events::EventBus;
use serde::{Deserialize, Serialize};

use crate::error::{ApprovalError, ApprovalResult};
use crate::queue::ApprovalQueue;
use crate::types::{ApprovalRequest, ApprovalStatus};

/// Default undo window after a successful execution.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(30);

/// What the sandboxed executor returns on a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Opaque identifier the executor can later use to run the
    /// compensating action. `None` if the action has no undo path.
    pub compensation_fn_id: Option<String>,
    /// Free-form output the caller may want to surface.
    pub output: Option<String>,
}

/// Collaborator contract for the sandbox the manager delegates to. One
/// concrete implementation wraps a cmd-allowlisted, read-only-root,
/// timeout-bounded container; this crate only defines the seam.
#[async_trait]
pub trait SandboxedExecutor: Send + Sync {
    /// Run the approved action. Errors surface as
    /// [`crate::error::ApprovalError::ExecutionFailed`]; the manager
    /// never retries.
    async fn execute(&self, request: &ApprovalRequest) -> Result<ExecutionReceipt, String>;

    /// Run the compensating action identified by `compensation_fn_id`.
    async fn undo(&self, compensation_fn_id: &str) -> Result<(), String>;
}

/// A short-lived affordance permitting compensating rollback of an
/// already-executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoTicket {
    /// Ticket id.
    pub id: UndoTicketId,
    /// The request this ticket was minted for.
    pub request_id: ApprovalRequestId,
    /// When the action actually ran.
    pub executed_at: Timestamp,
    /// The ticket is valid while `now < undo_deadline`.
    pub undo_deadline: Timestamp,
    /// Opaque handle the executor resolves back to its compensation.
    pub compensation_fn_id: String,
}

/// Whether an undo ticket can still be exercised, and how long is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoAvailability {
    /// Whether `undo` would currently succeed.
    pub available: bool,
    /// Milliseconds remaining before the window closes (0 if closed).
    pub remaining_ms: u64,
}

/// Runs approved actions through a caller-supplied sandbox and tracks
/// the resulting undo tickets.
pub struct ExecutionManager {
    queue: Arc<ApprovalQueue>,
    executor: Arc<dyn SandboxedExecutor>,
    audit_log: Arc<AuditLog>,
    events: Arc<EventBus>,
    tickets: Mutex<HashMap<ApprovalRequestId, UndoTicket>>,
    undo_window: Duration,
}

impl ExecutionManager {
    /// Build a manager over `queue`'s approved requests, delegating the
    /// actual run to `executor`.
    #[must_use]
    pub fn new(
        queue: Arc<ApprovalQueue>,
        executor: Arc<dyn SandboxedExecutor>,
        audit_log: Arc<AuditLog>,
        events: Arc<EventBus>,
    ) -> Self {
        Self::with_undo_window(queue, executor, audit_log, events, DEFAULT_UNDO_WINDOW)
    }

    /// Like [`Self::new`] but overrides `undoWindowMs`.
    #[must_use]
    pub fn with_undo_window(
        queue: Arc<ApprovalQueue>,
        executor: Arc<dyn SandboxedExecutor>,
        audit_log: Arc<AuditLog>,
        events: Arc<EventBus>,
        undo_window: Duration,
    ) -> Self {
        Self { queue, executor, audit_log, events, tickets: Mutex::new(HashMap::new()), undo_window }
    }

    fn tickets(&self) -> std::sync::MutexGuard<'_, HashMap<ApprovalRequestId, UndoTicket>> {
        self.tickets.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run the approved request through the sandbox. Mints an undo
    /// ticket on success if the executor returned a compensation id.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NotApproved`] if the request isn't in
    /// `approved` state, [`ApprovalError::AlreadyExecuted`] if a ticket
    /// already exists for it, or [`ApprovalError::ExecutionFailed`] if
    /// the sandbox itself fails.
    pub async fn execute(&self, id: ApprovalRequestId) -> ApprovalResult<Option<UndoTicket>> {
        let request = self.queue.get(id).ok_or(ApprovalError::NotFound(id))?;
        if request.status != ApprovalStatus::Approved {
            return Err(ApprovalError::NotApproved(id));
        }
        if self.tickets().contains_key(&id) {
            return Err(ApprovalError::AlreadyExecuted(id));
        }

        let receipt = self.executor.execute(&request).await.map_err(ApprovalError::ExecutionFailed)?;

        self.record_global(AuditEventType::SandboxExecution, Severity::Info, format!("approval {id} executed"), &request)
            .await;
        self.events.publish("approval.executed", serde_json::json!({ "request_id": id.to_string() }));

        let Some(compensation_fn_id) = receipt.compensation_fn_id else {
            return Ok(None);
        };
        let executed_at = Timestamp::now();
        let ticket = UndoTicket {
            id: UndoTicketId::new(),
            request_id: id,
            executed_at,
            undo_deadline: executed_at.plus_seconds(self.undo_window.as_secs_f64().ceil() as i64),
            compensation_fn_id,
        };
        self.tickets().insert(id, ticket.clone());
        Ok(Some(ticket))
    }

    /// Whether `id`'s undo ticket, if any, is still exercisable.
    #[must_use]
    pub fn can_undo(&self, id: ApprovalRequestId) -> UndoAvailability {
        let now = Timestamp::now();
        match self.tickets().get(&id) {
            Some(ticket) if ticket.undo_deadline > now => {
                let remaining_ms = (ticket.undo_deadline.unix_timestamp() - now.unix_timestamp()).max(0) as u64 * 1000;
                UndoAvailability { available: true, remaining_ms }
            },
            _ => UndoAvailability { available: false, remaining_ms: 0 },
        }
    }

    /// Run the compensation and invalidate the ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NoUndoTicket`] if none exists,
    /// [`ApprovalError::UndoWindowClosed`] if the deadline has passed,
    /// or [`ApprovalError::UndoFailed`] if the compensation itself
    /// fails (the ticket is retained in that case so the caller may
    /// retry within the window).
    pub async fn undo(&self, id: ApprovalRequestId) -> ApprovalResult<()> {
        let ticket = self.tickets().get(&id).cloned().ok_or(ApprovalError::NoUndoTicket(id))?;
        if ticket.undo_deadline <= Timestamp::now() {
            return Err(ApprovalError::UndoWindowClosed(id));
        }
        self.executor.undo(&ticket.compensation_fn_id).await.map_err(ApprovalError::UndoFailed)?;
        self.tickets().remove(&id);

        if let Some(request) = self.queue.get(id) {
            self.record_global(AuditEventType::SandboxExecution, Severity::Info, format!("approval {id} undone"), &request)
                .await;
        }
        self.events.publish("approval.undone", serde_json::json!({ "request_id": id.to_string() }));
        Ok(())
    }

    /// Drop every ticket whose undo window has closed. Returns the
    /// count removed.
    pub fn sweep_expired_tickets(&self) -> usize {
        let now = Timestamp::now();
        let mut tickets = self.tickets();
        let before = tickets.len();
        tickets.retain(|_, ticket| ticket.undo_deadline > now);
        before - tickets.len()
    }

    async fn record_global(&self, event_type: AuditEventType, severity: Severity, message: String, request: &ApprovalRequest) {
        if let Err(error) = self.audit_log.record(event_type, severity, message, request.owner).await {
            tracing::warn!(%error, "failed to append execution transition to audit log");
        }
    }
}

#[cfg(test)]
mod tests {
    use sentry_core::SessionId;

    use super::*;
    use crate::risk::RiskScorer;
    use crate::types::Category;

    struct StubExecutor {
        fails: bool,
        compensation_fn_id: Option<String>,
        undo_fails: bool,
    }

    #[async_trait]
    impl SandboxedExecutor for StubExecutor {
        async fn execute(&self, _request: &ApprovalRequest) -> Result<ExecutionReceipt, String> {
            if self.fails {
                return Err("sandbox exploded".to_string());
            }
            Ok(ExecutionReceipt { compensation_fn_id: self.compensation_fn_id.clone(), output: Some("ok".to_string()) })
        }

        async fn undo(&self, _compensation_fn_id: &str) -> Result<(), String> {
            if self.undo_fails { Err("compensation failed".to_string()) } else { Ok(()) }
        }
    }

    async fn approved_request(queue: &ApprovalQueue) -> ApprovalRequestId {
        let request = queue
            .create(Category::FileDelete, "rm draft.txt", "rm draft.txt", "cleanup", SessionId::new(), None, None, None)
            .await;
        queue.approve(request.id, None, false).await.unwrap();
        request.id
    }

    #[tokio::test]
    async fn execute_mints_undo_ticket_and_undo_invalidates_it() {
        let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new())));
        let id = approved_request(&queue).await;
        let executor = Arc::new(StubExecutor { fails: false, compensation_fn_id: Some("restore-draft".to_string()), undo_fails: false });
        let manager = ExecutionManager::new(queue, executor, Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()));

        let ticket = manager.execute(id).await.unwrap().expect("compensation id given");
        assert_eq!(ticket.request_id, id);
        assert!(manager.can_undo(id).available);

        manager.undo(id).await.unwrap();
        assert!(!manager.can_undo(id).available);
        assert!(matches!(manager.undo(id).await, Err(ApprovalError::NoUndoTicket(_))));
    }

    #[tokio::test]
    async fn execute_without_prior_approval_fails() {
        let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new())));
        let request = queue
            .create(Category::FileDelete, "rm draft.txt", "rm draft.txt", "cleanup", SessionId::new(), None, None, None)
            .await;
        let executor = Arc::new(StubExecutor { fails: false, compensation_fn_id: None, undo_fails: false });
        let manager = ExecutionManager::new(queue, executor, Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()));

        assert!(matches!(manager.execute(request.id).await, Err(ApprovalError::NotApproved(_))));
    }

    #[tokio::test]
    async fn executor_failure_surfaces_as_execution_failed() {
        let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new())));
        let id = approved_request(&queue).await;
        let executor = Arc::new(StubExecutor { fails: true, compensation_fn_id: None, undo_fails: false });
        let manager = ExecutionManager::new(queue, executor, Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()));

        assert!(matches!(manager.execute(id).await, Err(ApprovalError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn undo_past_deadline_is_rejected() {
        let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new())));
        let id = approved_request(&queue).await;
        let executor = Arc::new(StubExecutor { fails: false, compensation_fn_id: Some("restore".to_string()), undo_fails: false });
        let manager = ExecutionManager::with_undo_window(
            queue,
            executor,
            Arc::new(AuditLog::in_memory()),
            Arc::new(EventBus::new()),
            Duration::from_secs(0),
        );

        manager.execute(id).await.unwrap();
        assert!(matches!(manager.undo(id).await, Err(ApprovalError::UndoWindowClosed(_))));
    }

    #[tokio::test]
    async fn action_with_no_compensation_mints_no_ticket() {
        let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new())));
        let id = approved_request(&queue).await;
        let executor = Arc::new(StubExecutor { fails: false, compensation_fn_id: None, undo_fails: false });
        let manager = ExecutionManager::new(queue, executor, Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()));

        assert!(manager.execute(id).await.unwrap().is_none());
        assert!(!manager.can_undo(id).available);
    }
}
