//! Rollout Controller (C13): phase gating, freeze levels, and
//! eligibility assessment for new sign-ups.

use std::sync::{Arc, Mutex};

use sentry_audit::{AuditLog, EventType as AuditEventType, Severity};
use sentry_core::{OwnerId, Timestamp, TrustSignalId};
use sentry_events::EventBus;

use crate::error::{TrustError, TrustResult};
use crate::types::{EligibilityProfile, EligibilityResult, FreezeState, RolloutPhase, RolloutState};

/// Anti-targets that disqualify a candidate from every phase, regardless
/// of which traits they also carry.
const HARD_ANTI_TARGETS: &[&str] = &["flagged_for_abuse", "under_investigation", "previously_banned"];

/// Holds process-wide rollout state: phase, freeze levels, and clean-day
/// bookkeeping. The [`crate::monitor::TrustMonitor`] drives `trigger_halt`
/// and `freeze`; an administrator drives `advance_phase` and `unfreeze`.
pub struct RolloutController {
    state: Mutex<RolloutState>,
    audit_log: Arc<AuditLog>,
    events: Arc<EventBus>,
}

impl RolloutController {
    /// Build a controller starting at phase 0 (builder-only), unfrozen.
    #[must_use]
    pub fn new(audit_log: Arc<AuditLog>, events: Arc<EventBus>) -> Self {
        Self { state: Mutex::new(RolloutState::default()), audit_log, events }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RolloutState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// A snapshot of the current rollout state.
    #[must_use]
    pub fn state(&self) -> RolloutState {
        self.lock().clone()
    }

    /// Called by the Trust Monitor when a signal crosses its stop
    /// threshold. Always freezes; the reason names the offending signal.
    pub async fn trigger_halt(&self, signal: crate::types::SignalType, value: f64, measurement_id: TrustSignalId) {
        self.freeze(format!("signal {signal} at {value:.4} (measurement {measurement_id})"), "trust_monitor").await;
    }

    /// Freeze new sign-ups. Idempotent: re-freezing while already frozen
    /// overwrites the reason and actor but does not double-count.
    pub async fn freeze(&self, reason: impl Into<String>, by: impl Into<String>) {
        let reason = reason.into();
        let by = by.into();
        {
            let mut state = self.lock();
            state.freeze = FreezeState {
                frozen: true,
                frozen_at: Some(Timestamp::now()),
                reason: Some(reason.clone()),
                by: Some(by.clone()),
            };
        }
        if let Err(error) =
            self.audit_log.record(AuditEventType::RolloutFreeze, Severity::Critical, format!("rollout frozen: {reason}"), None).await
        {
            tracing::warn!(%error, "failed to audit rollout freeze");
        }
        self.events.publish("rollout.freeze", serde_json::json!({ "reason": reason, "by": by }));
    }

    /// Lift the freeze. Requires explicit administrative action; there
    /// is no automatic unfreeze.
    pub async fn unfreeze(&self, by: impl Into<String>) {
        let by = by.into();
        {
            let mut state = self.lock();
            state.freeze = FreezeState::default();
        }
        if let Err(error) =
            self.audit_log.record(AuditEventType::RolloutUnfreeze, Severity::Info, format!("rollout unfrozen by {by}"), None).await
        {
            tracing::warn!(%error, "failed to audit rollout unfreeze");
        }
        self.events.publish("rollout.unfreeze", serde_json::json!({ "by": by }));
    }

    /// Additionally suppress scheduled briefing generation while
    /// preserving data.
    pub async fn disable_briefings(&self, by: impl Into<String>) {
        self.lock().briefings_disabled = true;
        self.record_and_publish(AuditEventType::RolloutBriefingsDisabled, "briefings disabled", &by.into()).await;
    }

    /// Resume scheduled briefing generation.
    pub async fn enable_briefings(&self, by: impl Into<String>) {
        self.lock().briefings_disabled = false;
        self.record_and_publish(AuditEventType::RolloutBriefingsEnabled, "briefings enabled", &by.into()).await;
    }

    async fn record_and_publish(&self, event_type: AuditEventType, message: &str, by: &str) {
        if let Err(error) = self.audit_log.record(event_type, Severity::Info, format!("{message} by {by}"), None).await {
            tracing::warn!(%error, "failed to audit rollout state change");
        }
        self.events.publish("rollout.state_changed", serde_json::json!({ "change": message, "by": by }));
    }

    /// Record that `day` (`YYYY-MM-DD`, UTC) was observed clean,
    /// extending the streak, or reset it to zero if it was not. Called
    /// once per calendar day by the caller's scheduler, consulting
    /// [`crate::monitor::TrustMonitor::is_clean_day`].
    pub async fn record_day(&self, day: impl Into<String>, was_clean: bool) {
        let day = day.into();
        let reset;
        {
            let mut state = self.lock();
            if state.last_clean_day_check.as_deref() == Some(day.as_str()) {
                return;
            }
            state.last_clean_day_check = Some(day.clone());
            if was_clean {
                state.consecutive_clean_days += 1;
                reset = false;
            } else {
                state.consecutive_clean_days = 0;
                reset = true;
            }
        }
        let event_type = if reset { AuditEventType::RolloutCleanDaysReset } else { AuditEventType::RolloutCleanDay };
        if let Err(error) = self.audit_log.record(event_type, Severity::Info, format!("day {day} clean={was_clean}"), None).await {
            tracing::warn!(%error, "failed to audit clean-day check");
        }
        self.events.publish("rollout.clean_day", serde_json::json!({ "day": day, "clean": was_clean }));
    }

    /// Advance from the current phase to the next one. Requires an
    /// unfrozen state, a sufficient clean-day streak, and the caller to
    /// hold administrative confirmation (represented here by `confirmed`
    /// rather than a separate identity check, which belongs to the
    /// session authenticator).
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Frozen`] while frozen,
    /// [`TrustError::AlreadyOpen`] at phase 3, or
    /// [`TrustError::InsufficientCleanDays`] if the streak is short.
    pub async fn advance_phase(&self, confirmed: bool, by: impl Into<String>) -> TrustResult<RolloutPhase> {
        let by = by.into();
        let (next, consecutive_clean_days) = {
            let state = self.lock();
            if state.freeze.frozen {
                return Err(TrustError::Frozen(state.freeze.reason.clone().unwrap_or_default()));
            }
            let next = state.phase.next().ok_or(TrustError::AlreadyOpen)?;
            let required = state.phase.clean_days_to_advance().unwrap_or(0);
            if !confirmed || state.consecutive_clean_days < required {
                return Err(TrustError::InsufficientCleanDays {
                    consecutive_clean_days: state.consecutive_clean_days,
                    required,
                });
            }
            (next, state.consecutive_clean_days)
        };
        {
            let mut state = self.lock();
            state.phase = next;
            state.last_phase_change = Some(Timestamp::now());
        }
        if let Err(error) = self
            .audit_log
            .record(
                AuditEventType::RolloutPhaseChange,
                Severity::Info,
                format!("advanced to phase {} after {consecutive_clean_days} clean days, confirmed by {by}", next.as_u8()),
                None,
            )
            .await
        {
            tracing::warn!(%error, "failed to audit phase change");
        }
        self.events.publish("rollout.phase_change", serde_json::json!({ "phase": next.as_u8() }));
        Ok(next)
    }

    /// Roll back to an earlier phase. Administrative override; not
    /// reachable from [`Self::advance_phase`], which only moves upward.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NonMonotonePhase`] if `target` is not
    /// strictly below the current phase.
    pub async fn rollback_phase(&self, target: RolloutPhase, by: impl Into<String>) -> TrustResult<()> {
        let by = by.into();
        {
            let state = self.lock();
            if target >= state.phase {
                return Err(TrustError::NonMonotonePhase { current: state.phase.as_u8(), target: target.as_u8() });
            }
        }
        {
            let mut state = self.lock();
            state.phase = target;
            state.consecutive_clean_days = 0;
            state.last_phase_change = Some(Timestamp::now());
        }
        if let Err(error) = self
            .audit_log
            .record(
                AuditEventType::RolloutPhaseChange,
                Severity::Warning,
                format!("rolled back to phase {} by {by}", target.as_u8()),
                None,
            )
            .await
        {
            tracing::warn!(%error, "failed to audit phase rollback");
        }
        Ok(())
    }

    /// Whether admitting one more active user would exceed the current
    /// phase's cap.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        let state = self.lock();
        state.phase.user_cap().is_none_or(|cap| state.active_users < cap)
    }

    /// Pure eligibility assessment for a Phase 0/1/2 invitation: any
    /// hard anti-target disqualifies outright; otherwise a candidate is
    /// eligible once the current phase is not at capacity and is
    /// unfrozen.
    pub async fn assess_eligibility(&self, profile: &EligibilityProfile) -> EligibilityResult {
        let mut blocked_reasons = Vec::new();
        for anti_target in &profile.anti_targets {
            if HARD_ANTI_TARGETS.contains(&anti_target.as_str()) {
                blocked_reasons.push(format!("anti_target:{anti_target}"));
            }
        }
        let (frozen, at_capacity) = {
            let state = self.lock();
            (state.freeze.frozen, state.phase.user_cap().is_some_and(|cap| state.active_users >= cap))
        };
        if frozen {
            blocked_reasons.push("rollout_frozen".to_string());
        }
        if at_capacity {
            blocked_reasons.push("phase_at_capacity".to_string());
        }
        let eligible = blocked_reasons.is_empty();
        if let Err(error) = self
            .audit_log
            .record_with_metadata(
                AuditEventType::RolloutEligibilityAssessed,
                Severity::Info,
                format!("eligibility assessed: eligible={eligible}"),
                None,
                serde_json::json!({ "traits": profile.traits, "anti_targets": profile.anti_targets, "blocked_reasons": blocked_reasons }),
            )
            .await
        {
            tracing::warn!(%error, "failed to audit eligibility assessment");
        }
        EligibilityResult { eligible, blocked_reasons }
    }

    /// Admit a newly eligible user, incrementing both user counters.
    pub fn admit_user(&self) {
        let mut state = self.lock();
        state.total_users += 1;
        state.active_users += 1;
    }

    /// Remove an active user without reducing the lifetime total.
    pub fn deactivate_user(&self) {
        let mut state = self.lock();
        state.active_users = state.active_users.saturating_sub(1);
    }

    /// Convenience for callers that only need to gate on freeze state,
    /// e.g. the sign-up endpoint's "paused" response.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.lock().freeze.frozen
    }

    /// Record an administrative action against the rollout state under
    /// the acting owner's id.
    pub async fn record_administrative_action(&self, by: OwnerId, action: impl Into<String>) {
        let action = action.into();
        if let Err(error) = self
            .audit_log
            .record(AuditEventType::ConfigChanged, Severity::Info, action, Some(by))
            .await
        {
            tracing::warn!(%error, "failed to audit administrative rollout action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RolloutController {
        RolloutController::new(Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn advance_requires_confirmation_and_clean_days() {
        let rollout = controller();
        let err = rollout.advance_phase(true, "admin").await.unwrap_err();
        assert!(matches!(err, TrustError::InsufficientCleanDays { .. }));
    }

    #[tokio::test]
    async fn advance_succeeds_once_streak_met() {
        let rollout = controller();
        for day in 0..7 {
            rollout.record_day(format!("2026-01-0{day}"), true).await;
        }
        let phase = rollout.advance_phase(true, "admin").await.unwrap();
        assert_eq!(phase, RolloutPhase::TrustedTesters);
    }

    #[tokio::test]
    async fn frozen_state_blocks_advance() {
        let rollout = controller();
        rollout.freeze("test", "unit_test").await;
        let err = rollout.advance_phase(true, "admin").await.unwrap_err();
        assert!(matches!(err, TrustError::Frozen(_)));
    }

    #[tokio::test]
    async fn eligibility_blocks_hard_anti_targets() {
        let rollout = controller();
        let profile = EligibilityProfile { traits: vec![], anti_targets: vec!["flagged_for_abuse".into()] };
        let result = rollout.assess_eligibility(&profile).await;
        assert!(!result.eligible);
        assert!(result.blocked_reasons.contains(&"anti_target:flagged_for_abuse".to_string()));
    }

    #[tokio::test]
    async fn eligibility_respects_phase_capacity() {
        let rollout = controller();
        rollout.admit_user();
        let profile = EligibilityProfile::default();
        let result = rollout.assess_eligibility(&profile).await;
        assert!(!result.eligible);
    }

    #[tokio::test]
    async fn rollback_rejects_non_monotone_target() {
        let rollout = controller();
        let result = rollout.rollback_phase(RolloutPhase::Open, "admin").await;
        assert!(matches!(result, Err(TrustError::NonMonotonePhase { .. })));
    }
}
