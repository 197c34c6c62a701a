//! Shared types for trust signals, regression events, and rollout state.

use sentry_core::{OwnerId, RegressionId, Timestamp, TrustSignalId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The six signals the Trust Monitor computes every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// S1: failed briefings / total.
    BriefingFailureRate,
    /// S2: distinct briefings with a retry / total viewed.
    RetryRate,
    /// S3: briefings with at least one failed section / total.
    PartialSuccessRate,
    /// S4: items dismissed / total created.
    DismissalRate,
    /// S5: average retries per session.
    RefreshLoops,
    /// S6: count of critical trust-risk alert events.
    TrustRiskAlerts,
}

impl SignalType {
    /// All six signals, in spec order.
    pub const ALL: [SignalType; 6] = [
        SignalType::BriefingFailureRate,
        SignalType::RetryRate,
        SignalType::PartialSuccessRate,
        SignalType::DismissalRate,
        SignalType::RefreshLoops,
        SignalType::TrustRiskAlerts,
    ];
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalType::BriefingFailureRate => "briefing_failure_rate",
            SignalType::RetryRate => "retry_rate",
            SignalType::PartialSuccessRate => "partial_success_rate",
            SignalType::DismissalRate => "dismissal_rate",
            SignalType::RefreshLoops => "refresh_loops",
            SignalType::TrustRiskAlerts => "trust_risk_alerts",
        };
        f.write_str(s)
    }
}

/// Classification of a single signal measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    /// Within the normal band.
    Normal,
    /// Elevated but not yet actionable alone.
    Warning,
    /// Past the stop threshold; a candidate for `trigger_halt`.
    Stop,
}

impl std::fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalLevel::Normal => "normal",
            SignalLevel::Warning => "warning",
            SignalLevel::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// A single computed signal value, persisted every sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSignalMeasurement {
    /// Opaque identifier.
    pub id: TrustSignalId,
    /// Which signal this is.
    pub signal_type: SignalType,
    /// The computed ratio or count.
    pub value: f64,
    /// Classification derived from the fixed thresholds table.
    pub level: SignalLevel,
    /// Numerator of the ratio, when the signal is ratio-shaped.
    pub numerator: Option<u64>,
    /// Denominator of the ratio, when the signal is ratio-shaped.
    pub denominator: Option<u64>,
    /// Start of the moving window this measurement covers.
    pub period_start: Timestamp,
    /// End of the moving window this measurement covers.
    pub period_end: Timestamp,
    /// When the measurement was taken.
    pub measured_at: Timestamp,
    /// Free-form extra context, e.g. which override condition fired.
    pub metadata: Option<Value>,
}

/// Severity of a recorded regression event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionSeverity {
    /// Logged but not freeze-worthy on its own.
    Warning,
    /// Sufficient to freeze the rollout.
    Critical,
}

/// A single user- or system-reported trust regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRegressionEvent {
    /// Opaque identifier.
    pub id: RegressionId,
    /// The owner the regression is attributed to.
    pub owner: OwnerId,
    /// Short machine-readable cause, e.g. `retry_button_spam`.
    pub trigger: String,
    /// Severity; `Critical` always freezes.
    pub severity: RegressionSeverity,
    /// Human-readable description.
    pub description: String,
    /// Whether a human reported this directly, as opposed to the monitor
    /// deriving it from signal thresholds.
    pub user_reported: bool,
    /// Free-text feedback accompanying a user report.
    pub user_feedback: Option<String>,
    /// The briefing this regression was observed on, if any.
    pub briefing_id: Option<String>,
    /// When this was recorded.
    pub at: Timestamp,
    /// Whether this has been marked resolved.
    pub resolved: bool,
    /// When it was resolved.
    pub resolved_at: Option<Timestamp>,
    /// Free-text resolution note.
    pub resolution: Option<String>,
}

/// The four rollout phases, in spec order. Transitions are monotone
/// upward except via explicit administrative rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum RolloutPhase {
    /// Builder-only: cap 1, 7 consecutive clean days to advance.
    BuilderOnly = 0,
    /// Trusted testers: cap 5, 14 consecutive clean days to advance.
    TrustedTesters = 1,
    /// Extended pilot: cap 15, 30 consecutive clean days to advance.
    ExtendedPilot = 2,
    /// Open: unlimited cap, no further requirement.
    Open = 3,
}

impl RolloutPhase {
    /// User cap for this phase, or `None` for unlimited.
    #[must_use]
    pub const fn user_cap(self) -> Option<u32> {
        match self {
            RolloutPhase::BuilderOnly => Some(1),
            RolloutPhase::TrustedTesters => Some(5),
            RolloutPhase::ExtendedPilot => Some(15),
            RolloutPhase::Open => None,
        }
    }

    /// Consecutive clean days required to advance past this phase, or
    /// `None` if this is the terminal phase.
    #[must_use]
    pub const fn clean_days_to_advance(self) -> Option<u32> {
        match self {
            RolloutPhase::BuilderOnly => Some(7),
            RolloutPhase::TrustedTesters => Some(14),
            RolloutPhase::ExtendedPilot => Some(30),
            RolloutPhase::Open => None,
        }
    }

    /// The next phase up, or `None` if already `Open`.
    #[must_use]
    pub const fn next(self) -> Option<RolloutPhase> {
        match self {
            RolloutPhase::BuilderOnly => Some(RolloutPhase::TrustedTesters),
            RolloutPhase::TrustedTesters => Some(RolloutPhase::ExtendedPilot),
            RolloutPhase::ExtendedPilot => Some(RolloutPhase::Open),
            RolloutPhase::Open => None,
        }
    }

    /// Numeric phase as written in the spec table.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Two-level freeze state. `frozen` rejects sign-ups; `briefings_disabled`
/// additionally suppresses scheduled briefing generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreezeState {
    /// Whether new sign-ups are currently rejected.
    pub frozen: bool,
    /// When the freeze was set.
    pub frozen_at: Option<Timestamp>,
    /// Why the freeze was triggered.
    pub reason: Option<String>,
    /// Who or what triggered the freeze, e.g. `trust_monitor` or an admin id.
    pub by: Option<String>,
}

/// Process-wide rollout state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutState {
    /// Current phase.
    pub phase: RolloutPhase,
    /// Consecutive clean calendar days observed at the current phase.
    pub consecutive_clean_days: u32,
    /// The last calendar day (`YYYY-MM-DD`) the clean-day check considered.
    pub last_clean_day_check: Option<String>,
    /// Total users ever admitted.
    pub total_users: u32,
    /// Currently active users.
    pub active_users: u32,
    /// Sign-up and briefing freeze state.
    pub freeze: FreezeState,
    /// Whether scheduled briefing generation is suppressed.
    pub briefings_disabled: bool,
    /// When the phase last changed.
    pub last_phase_change: Option<Timestamp>,
}

impl Default for RolloutState {
    fn default() -> Self {
        Self {
            phase: RolloutPhase::BuilderOnly,
            consecutive_clean_days: 0,
            last_clean_day_check: None,
            total_users: 0,
            active_users: 0,
            freeze: FreezeState::default(),
            briefings_disabled: false,
            last_phase_change: None,
        }
    }
}

/// Caller-supplied traits and anti-targets consulted by eligibility
/// assessment. Traits are named boolean facts about the candidate
/// (`has_api_experience`, `opted_into_beta`, ...); anti-targets are
/// named disqualifying facts (`flagged_for_abuse`, `under_investigation`,
/// ...). Both are open vocabularies the caller and the assessed phase's
/// policy agree on out of band.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EligibilityProfile {
    /// Qualifying traits present for this candidate.
    pub traits: Vec<String>,
    /// Disqualifying anti-targets present for this candidate.
    pub anti_targets: Vec<String>,
}

/// Outcome of an eligibility assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// Whether the candidate is eligible for the assessed phase.
    pub eligible: bool,
    /// Why not, when `eligible` is `false`.
    pub blocked_reasons: Vec<String>,
}
