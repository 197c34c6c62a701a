//! A high-risk dangerous-command request is denied before it expires;
//! once decided, it cannot be approved.

use std::sync::Arc;

use sentry_approval::{ApprovalError, ApprovalQueue, ApprovalStatus, AuditAction, Category, RiskScorer};
use sentry_audit::AuditLog;
use sentry_core::SessionId;
use sentry_events::EventBus;

#[tokio::test]
async fn denied_request_cannot_later_be_approved() {
    let audit = Arc::new(AuditLog::in_memory());
    let events = Arc::new(EventBus::new());
    let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::clone(&audit), Arc::clone(&events)));
    let session = SessionId::new();

    let request = queue
        .create(
            Category::DangerousCommand,
            "cleanup",
            "rm -rf /tmp/atlas-*",
            "scheduled workspace cleanup",
            session,
            None,
            None,
            None,
        )
        .await;
    assert_eq!(request.status, ApprovalStatus::Pending);

    let denied = queue.deny(request.id, None, Some("unsafe pattern".to_string())).await.expect("pending request is denyable");
    assert_eq!(denied.status, ApprovalStatus::Denied);

    let trail = queue.audit_trail_for(request.id);
    assert_eq!(trail.len(), 2);
    assert!(matches!(trail[0].action, AuditAction::Created));
    assert!(matches!(trail[1].action, AuditAction::Denied));

    let err = queue.approve(request.id, None, false).await.unwrap_err();
    assert!(matches!(err, ApprovalError::InvalidState(id) if id == request.id));
}
