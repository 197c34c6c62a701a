//! Concrete [`GcTarget`] adapters wiring the scheduler to the
//! components that accumulate expired state. `sentry-gc` only defines
//! the seam; these wrappers supply it the same way
//! [`crate::executor::AllowlistExecutor`] supplies `SandboxedExecutor`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sentry_approval::{ApprovalQueue, ExecutionManager};
use sentry_auth::SessionAuthenticator;
use sentry_core::Timestamp;
use sentry_gc::GcTarget;
use sentry_llm::ModelResponse;
use sentry_pipeline::PromptCache;

/// Sweeps expired/revoked session records.
pub struct SessionGcTarget(pub Arc<SessionAuthenticator>);

#[async_trait]
impl GcTarget for SessionGcTarget {
    fn label(&self) -> &'static str {
        "sessions"
    }

    async fn sweep(&self) -> Result<usize, String> {
        self.0.sweep_expired().await.map_err(|e| e.to_string())
    }
}

/// Sweeps expired entries out of a [`PromptCache`].
pub struct PromptCacheGcTarget(pub Arc<PromptCache<ModelResponse>>);

#[async_trait]
impl GcTarget for PromptCacheGcTarget {
    fn label(&self) -> &'static str {
        "prompt_cache"
    }

    async fn sweep(&self) -> Result<usize, String> {
        Ok(self.0.sweep_expired().await)
    }
}

/// Sweeps approval requests past their TTL to `expired`.
pub struct ApprovalGcTarget(pub Arc<ApprovalQueue>);

#[async_trait]
impl GcTarget for ApprovalGcTarget {
    fn label(&self) -> &'static str {
        "approval_requests"
    }

    async fn sweep(&self) -> Result<usize, String> {
        Ok(self.0.expire_sweep().await.len())
    }
}

/// Prunes approval audit-trail rows past the configured retention
/// window, the GC pass's second approval-queue target alongside
/// expired-pending sweeping.
pub struct ApprovalAuditGcTarget {
    /// The queue whose audit trail is pruned.
    pub queue: Arc<ApprovalQueue>,
    /// How long an audit entry survives before it's eligible for pruning.
    pub retention: Duration,
}

#[async_trait]
impl GcTarget for ApprovalAuditGcTarget {
    fn label(&self) -> &'static str {
        "approval_audit_history"
    }

    async fn sweep(&self) -> Result<usize, String> {
        Ok(self.queue.prune_history(self.retention, Timestamp::now()))
    }
}

/// Sweeps undo tickets past their undo deadline.
pub struct UndoTicketGcTarget(pub Arc<ExecutionManager>);

#[async_trait]
impl GcTarget for UndoTicketGcTarget {
    fn label(&self) -> &'static str {
        "undo_tickets"
    }

    async fn sweep(&self) -> Result<usize, String> {
        Ok(self.0.sweep_expired_tickets())
    }
}
