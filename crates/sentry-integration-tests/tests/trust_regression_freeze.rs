//! Four retries on one session inside the 60s spam window record a
//! critical regression and freeze the rollout.

use std::sync::Arc;

use sentry_audit::AuditLog;
use sentry_core::{OwnerId, SessionId};
use sentry_events::EventBus;
use sentry_trust::{RolloutController, TrustMonitor};

#[tokio::test]
async fn retry_spam_freezes_the_rollout() {
    let audit = Arc::new(AuditLog::in_memory());
    let events = Arc::new(EventBus::new());
    let rollout = Arc::new(RolloutController::new(Arc::clone(&audit), Arc::clone(&events)));
    let monitor = Arc::new(TrustMonitor::new(Arc::clone(&rollout), Arc::clone(&audit), Arc::clone(&events)));

    let owner = OwnerId::new();
    let session = SessionId::new();

    assert!(!rollout.is_frozen());

    for _ in 0..3 {
        monitor.record_retry(owner, session, Some("briefing-1".to_string()), None).await;
    }
    assert!(!rollout.is_frozen(), "three retries inside the window must not yet trip the spam threshold");

    monitor.record_retry(owner, session, Some("briefing-1".to_string()), None).await;
    assert!(rollout.is_frozen(), "the fourth retry within 60s must freeze the rollout");

    let entries = audit.storage().list_all().await.expect("audit storage is readable");
    assert!(entries.iter().any(|e| e.event_type == sentry_audit::EventType::RolloutFreeze));
    assert!(entries.iter().any(|e| e.event_type == sentry_audit::EventType::TrustBehaviorChange));
}
