//! A remembered approval installs an auto-approval rule; a later
//! matching request clears it without a human in the loop.

use std::sync::Arc;

use sentry_approval::{ApprovalQueue, Category, RiskScorer};
use sentry_audit::AuditLog;
use sentry_core::SessionId;
use sentry_events::EventBus;

#[tokio::test]
async fn remembered_approval_auto_approves_the_next_matching_request() {
    let audit = Arc::new(AuditLog::in_memory());
    let events = Arc::new(EventBus::new());
    let queue = Arc::new(ApprovalQueue::new(RiskScorer::default(), Arc::clone(&audit), Arc::clone(&events)));
    let session = SessionId::new();

    let first = queue
        .create(Category::NetworkCall, "GET api.github.com/user", "curl https://api.github.com/user", "read profile", session, None, None, None)
        .await;
    assert_eq!(first.status, sentry_approval::ApprovalStatus::Pending);

    queue.approve(first.id, None, true).await.expect("first request is pending and approvable");

    let second = queue
        .create(Category::NetworkCall, "GET api.github.com/user", "curl https://api.github.com/user/repos", "read repos", session, None, None, None)
        .await;

    assert_eq!(second.status, sentry_approval::ApprovalStatus::AutoApproved);
    assert!(second.matched_rule.is_some());

    let trail = queue.audit_trail_for(second.id);
    assert_eq!(trail.len(), 2, "creation and auto-approval should both be audited");
    assert!(matches!(trail[0].action, sentry_approval::AuditAction::Created));
    assert!(matches!(trail[1].action, sentry_approval::AuditAction::AutoApproved));
}
