//! Approval Queue (C10): risk-classified approval requests with TTL
//! expiry and auto-approval rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use globset::Glob;
use sentry_audit::{AuditLog, EventType as AuditEventType, Severity};
use sentry_core::{ApprovalRequestId, OwnerId, RiskLevel, SessionId, Timestamp};
use sentry_events::EventBus;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ApprovalError, ApprovalResult};
use crate::risk::RiskScorer;
use crate::types::{
    ApprovalAuditEntry, ApprovalRequest, ApprovalStatus, AuditAction, AutoApprovalRule, Category,
    HistoryFilter,
};

/// Default time-to-live for a newly created request before it is swept
/// to `expired`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default interval between `expire_sweep` runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

struct State {
    requests: HashMap<ApprovalRequestId, ApprovalRequest>,
    history: Vec<ApprovalAuditEntry>,
    rules: Vec<AutoApprovalRule>,
}

/// The approval state machine: a map of requests, their transition
/// history, and the auto-approval rules consulted at creation.
///
/// Every request-id transition (`approve`/`deny`) takes the single
/// `state` lock for its whole critical section, so a concurrent second
/// writer always observes the first writer's already-applied
/// transition and gets [`ApprovalError::InvalidState`] rather than
/// racing it.
pub struct ApprovalQueue {
    state: Mutex<State>,
    scorer: RiskScorer,
    audit_log: Arc<AuditLog>,
    events: Arc<EventBus>,
    next_audit_id: AtomicU64,
    default_ttl: Duration,
}

impl ApprovalQueue {
    /// Build a queue backed by the gateway's shared audit log and event
    /// bus.
    #[must_use]
    pub fn new(scorer: RiskScorer, audit_log: Arc<AuditLog>, events: Arc<EventBus>) -> Self {
        Self::with_default_ttl(scorer, audit_log, events, DEFAULT_TTL)
    }

    /// Like [`Self::new`] but overrides `approvalDefaultTTLms`.
    #[must_use]
    pub fn with_default_ttl(
        scorer: RiskScorer,
        audit_log: Arc<AuditLog>,
        events: Arc<EventBus>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State { requests: HashMap::new(), history: Vec::new(), rules: Vec::new() }),
            scorer,
            audit_log,
            events,
            next_audit_id: AtomicU64::new(1),
            default_ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record_local(
        state: &mut State,
        next_id: &AtomicU64,
        request_id: ApprovalRequestId,
        action: AuditAction,
        actor: Option<OwnerId>,
        details: Option<String>,
    ) {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        state.history.push(ApprovalAuditEntry { id, request_id, action, at: Timestamp::now(), actor, details });
    }

    async fn record_global(&self, event_type: AuditEventType, severity: Severity, message: String, owner: Option<OwnerId>) {
        if let Err(error) = self.audit_log.record(event_type, severity, message, owner).await {
            tracing::warn!(%error, "failed to append approval transition to audit log");
        }
    }

    /// Create a new request, ttl-defaulted if `ttl` is `None`. Before
    /// returning, evaluates the auto-approval rules in order; the first
    /// whose category, operation glob, and risk ceiling cover this
    /// request auto-approves it. The creation itself is always audited,
    /// as is a resulting auto-approval.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        category: Category,
        operation: impl Into<String>,
        action_body: impl Into<String>,
        context_text: impl Into<String>,
        session_id: SessionId,
        owner: Option<OwnerId>,
        metadata: Option<Value>,
        ttl: Option<Duration>,
    ) -> ApprovalRequest {
        let operation = operation.into();
        let action_body = action_body.into();
        let risk = self.scorer.score(category, &action_body);
        let created_at = Timestamp::now();
        let expires_at = created_at.plus_seconds(ttl.unwrap_or(self.default_ttl).as_secs_f64().ceil() as i64);

        let mut request = ApprovalRequest {
            id: ApprovalRequestId::new(),
            category,
            operation,
            action_body,
            risk,
            context_text: context_text.into(),
            technical_details: None,
            session_id,
            owner,
            created_at,
            expires_at,
            status: ApprovalStatus::Pending,
            matched_rule: None,
            metadata,
        };

        let matched_rule = {
            let state = self.lock();
            find_matching_rule(&state.rules, &request, created_at)
        };

        {
            let mut state = self.lock();
            Self::record_local(&mut state, &self.next_audit_id, request.id, AuditAction::Created, None, None);
            if let Some(rule_id) = &matched_rule {
                request.status = ApprovalStatus::AutoApproved;
                request.matched_rule = Some(rule_id.clone());
                Self::record_local(
                    &mut state,
                    &self.next_audit_id,
                    request.id,
                    AuditAction::AutoApproved,
                    None,
                    Some(format!("rule {rule_id} matched")),
                );
            }
            state.requests.insert(request.id, request.clone());
        }

        self.record_global(
            AuditEventType::ApprovalCreated,
            Severity::Info,
            format!("approval {} created for {:?}:{}", request.id, request.category, request.operation),
            request.owner,
        )
        .await;
        self.events.publish("approval.created", serde_json::to_value(&request).unwrap_or(Value::Null));

        if matched_rule.is_some() {
            self.record_global(
                AuditEventType::ApprovalAutoApproved,
                Severity::Info,
                format!("approval {} auto-approved", request.id),
                request.owner,
            )
            .await;
            self.events.publish("approval.auto_approved", serde_json::to_value(&request).unwrap_or(Value::Null));
        }

        request
    }

    /// Transition `pending -> approved`. When `remember` is set, also
    /// installs an auto-approval rule matching this exact category and
    /// operation at this request's risk ceiling.
    pub async fn approve(&self, id: ApprovalRequestId, actor: Option<OwnerId>, remember: bool) -> ApprovalResult<ApprovalRequest> {
        let request = {
            let mut state = self.lock();
            let request = state.requests.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
            if !request.is_pending() {
                return Err(ApprovalError::InvalidState(id));
            }
            request.status = ApprovalStatus::Approved;
            let snapshot = request.clone();
            Self::record_local(&mut state, &self.next_audit_id, id, AuditAction::Approved, actor, None);
            if remember {
                state.rules.push(AutoApprovalRule {
                    id: format!("remembered-{id}"),
                    category: snapshot.category,
                    operation_glob: snapshot.operation.clone(),
                    risk_ceiling: snapshot.risk,
                    owner: snapshot.owner,
                    expires_at: None,
                });
            }
            snapshot
        };
        self.record_global(
            AuditEventType::ApprovalApproved,
            Severity::Info,
            format!("approval {id} approved"),
            request.owner,
        )
        .await;
        self.events.publish("approval.approved", serde_json::to_value(&request).unwrap_or(Value::Null));
        Ok(request)
    }

    /// Transition `pending -> denied`.
    pub async fn deny(&self, id: ApprovalRequestId, actor: Option<OwnerId>, reason: Option<String>) -> ApprovalResult<ApprovalRequest> {
        let request = {
            let mut state = self.lock();
            let request = state.requests.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
            if !request.is_pending() {
                return Err(ApprovalError::InvalidState(id));
            }
            request.status = ApprovalStatus::Denied;
            let snapshot = request.clone();
            Self::record_local(&mut state, &self.next_audit_id, id, AuditAction::Denied, actor, reason.clone());
            snapshot
        };
        self.record_global(
            AuditEventType::ApprovalDenied,
            Severity::Warning,
            format!("approval {id} denied{}", reason.map(|r| format!(": {r}")).unwrap_or_default()),
            request.owner,
        )
        .await;
        self.events.publish("approval.denied", serde_json::to_value(&request).unwrap_or(Value::Null));
        Ok(request)
    }

    /// Move every pending request whose `expires_at < now` to `expired`,
    /// auditing each. Idempotent: a request already past `pending`
    /// is left untouched.
    pub async fn expire_sweep(&self) -> Vec<ApprovalRequestId> {
        let now = Timestamp::now();
        let expired: Vec<ApprovalRequestId> = {
            let mut state = self.lock();
            let ids: Vec<ApprovalRequestId> = state
                .requests
                .values()
                .filter(|r| r.is_pending() && r.expires_at < now)
                .map(|r| r.id)
                .collect();
            for id in &ids {
                if let Some(request) = state.requests.get_mut(id) {
                    request.status = ApprovalStatus::Expired;
                }
                Self::record_local(&mut state, &self.next_audit_id, *id, AuditAction::Expired, None, None);
            }
            ids
        };
        for id in &expired {
            self.record_global(AuditEventType::ApprovalExpired, Severity::Info, format!("approval {id} expired"), None)
                .await;
            self.events.publish("approval.expired", serde_json::json!({ "request_id": id.to_string() }));
        }
        expired
    }

    /// Drop audit-trail rows older than `retention`, keeping requests
    /// themselves untouched. Returns the count removed.
    pub fn prune_history(&self, retention: Duration, now: Timestamp) -> usize {
        let cutoff = now.plus_seconds(-i64::try_from(retention.as_secs()).unwrap_or(i64::MAX));
        let mut state = self.lock();
        let before = state.history.len();
        state.history.retain(|entry| entry.at >= cutoff);
        before - state.history.len()
    }

    /// All requests currently `pending`.
    #[must_use]
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        self.lock().requests.values().filter(|r| r.is_pending()).cloned().collect()
    }

    /// A single request by id, whatever its status.
    #[must_use]
    pub fn get(&self, id: ApprovalRequestId) -> Option<ApprovalRequest> {
        self.lock().requests.get(&id).cloned()
    }

    /// Decided and pending requests matching `filter`, newest first.
    #[must_use]
    pub fn history(&self, filter: &HistoryFilter) -> Vec<ApprovalRequest> {
        let state = self.lock();
        let mut rows: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|r| filter.category.is_none_or(|c| c == r.category))
            .filter(|r| filter.status.is_none_or(|s| s == r.status))
            .filter(|r| filter.owner.is_none_or(|o| Some(o) == r.owner))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let rows = rows.into_iter().skip(filter.offset);
        match filter.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    /// The queue's own indexed audit trail for one request, oldest first.
    #[must_use]
    pub fn audit_trail_for(&self, request_id: ApprovalRequestId) -> Vec<ApprovalAuditEntry> {
        self.lock().history.iter().filter(|e| e.request_id == request_id).cloned().collect()
    }
}

fn find_matching_rule(rules: &[AutoApprovalRule], request: &ApprovalRequest, now: Timestamp) -> Option<String> {
    rules.iter().find_map(|rule| {
        let applies = rule.is_active(now)
            && rule.category == request.category
            && rule.owner.is_none_or(|owner| Some(owner) == request.owner)
            && request.risk <= rule.risk_ceiling
            && Glob::new(&rule.operation_glob)
                .ok()
                .is_some_and(|g| g.compile_matcher().is_match(&request.operation));
        applies.then(|| rule.id.clone())
    })
}

/// Spawn the periodic `expire_sweep` task. The returned
/// [`CancellationToken`] stops the loop before its next tick.
#[must_use]
pub fn spawn_sweeper(queue: Arc<ApprovalQueue>, interval: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let expired = queue.expire_sweep().await;
                    if !expired.is_empty() {
                        tracing::debug!(count = expired.len(), "approval sweep expired pending requests");
                    }
                }
            }
        }
    });
    token
}
