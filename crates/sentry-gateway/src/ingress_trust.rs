//! Trust Monitor (C12) and Rollout Controller (C13) ingress operations:
//! briefing/regression telemetry in, phase and freeze state out.

use std::collections::HashMap;

use sentry_core::{ErrorKind, GatewayError, GatewayResult, OwnerId, SessionId};
use sentry_trust::{
    AlertKind, EligibilityProfile, EligibilityResult, RegressionSeverity, RolloutPhase, RolloutState, SignalType,
    TrustError, TrustRegressionEvent, TrustSignalMeasurement,
};

use crate::gateway::Gateway;

fn map_trust_error(err: TrustError) -> GatewayError {
    match err {
        TrustError::Frozen(reason) => GatewayError::conflict("rollout_frozen", format!("rollout is frozen: {reason}")),
        TrustError::AlreadyOpen => GatewayError::conflict("rollout_already_open", "rollout is already fully open"),
        TrustError::NonMonotonePhase { current, target } => {
            GatewayError::validation("non_monotone_phase", format!("phase {current} cannot advance directly to {target}"))
        },
        TrustError::InsufficientCleanDays { consecutive_clean_days, required } => GatewayError::new(
            ErrorKind::Conflict,
            "insufficient_clean_days",
            format!("{consecutive_clean_days} consecutive clean days, {required} required"),
        ),
    }
}

impl Gateway {
    /// Record that a briefing was viewed (S1 numerator input).
    pub fn record_briefing_viewed(&self, briefing_id: impl Into<String>) {
        self.trust.record_briefing_viewed(briefing_id);
    }

    /// Record that a briefing failed to generate.
    pub fn record_briefing_failed(&self, briefing_id: impl Into<String>) {
        self.trust.record_briefing_failed(briefing_id);
    }

    /// Record a user- or client-initiated retry on a briefing, feeding
    /// the retry-spam regression check.
    pub async fn record_retry(&self, owner: OwnerId, session: SessionId, briefing_id: Option<String>) {
        self.trust.record_retry(owner, session, briefing_id, None).await;
    }

    /// Record an item dismissal (S4 numerator).
    pub fn record_dismissal(&self, owner: OwnerId, item_type: impl Into<String>) {
        self.trust.record_dismissal(owner, item_type);
    }

    /// Record an item creation (S4 denominator).
    pub fn record_item_created(&self, owner: OwnerId, item_type: impl Into<String>) {
        self.trust.record_item_created(owner, item_type);
    }

    /// Record a critical trust-risk alert (S6).
    pub fn record_alert(&self, kind: AlertKind) {
        self.trust.record_alert(kind);
    }

    /// Record a regression. `Critical` severity freezes the rollout.
    pub async fn record_regression(
        &self,
        owner: OwnerId,
        trigger: impl Into<String>,
        severity: RegressionSeverity,
        description: impl Into<String>,
    ) -> TrustRegressionEvent {
        self.trust.record_regression(owner, trigger, severity, description, false, None, None).await
    }

    /// Record the always-critical "feels wrong" user report.
    pub async fn record_feels_wrong_report(&self, owner: OwnerId, feedback: impl Into<String>) -> TrustRegressionEvent {
        self.trust.record_feels_wrong_report(owner, feedback).await
    }

    /// Every signal's latest measurement, keyed by signal type.
    #[must_use]
    pub fn latest_trust_signals(&self) -> HashMap<SignalType, TrustSignalMeasurement> {
        self.trust.latest()
    }

    /// The current rollout phase, freeze state, and active-user count.
    #[must_use]
    pub fn rollout_state(&self) -> RolloutState {
        self.rollout.state()
    }

    /// Whether the rollout is currently frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.rollout.is_frozen()
    }

    /// Advance one phase, provided the clean-day streak clears the
    /// target phase's requirement and the rollout isn't frozen.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Conflict`] if frozen or already fully open,
    /// or if the clean-day streak is short of the target's requirement.
    pub async fn advance_rollout_phase(&self, confirmed: bool, by: impl Into<String>) -> GatewayResult<RolloutPhase> {
        self.rollout.advance_phase(confirmed, by).await.map_err(map_trust_error)
    }

    /// Administratively roll back to an earlier phase.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Validation`] if `target` is not strictly
    /// below the current phase.
    pub async fn rollback_rollout_phase(&self, target: RolloutPhase, by: impl Into<String>) -> GatewayResult<()> {
        self.rollout.rollback_phase(target, by).await.map_err(map_trust_error)
    }

    /// Manually freeze the rollout, independent of any trust signal.
    pub async fn freeze_rollout(&self, reason: impl Into<String>, by: impl Into<String>) {
        self.rollout.freeze(reason, by).await;
    }

    /// Clear a manual or signal-triggered freeze.
    pub async fn unfreeze_rollout(&self, by: impl Into<String>) {
        self.rollout.unfreeze(by).await;
    }

    /// Pure eligibility assessment for a Phase 0/1/2 invitation
    /// candidate, without admitting them.
    #[must_use]
    pub async fn assess_eligibility(&self, profile: &EligibilityProfile) -> EligibilityResult {
        self.rollout.assess_eligibility(profile).await
    }

    /// Admit one more active user against the current phase's cap.
    pub fn admit_user(&self) {
        self.rollout.admit_user();
    }
}
