//! Trust Monitor (C12): the six-signal behavioral health check that
//! feeds the Rollout Controller's freeze decision.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentry_audit::{AuditLog, EventType as AuditEventType, Severity};
use sentry_core::{OwnerId, RegressionId, SessionId, Timestamp, TrustSignalId};
use sentry_events::EventBus;
use tokio_util::sync::CancellationToken;

use crate::rollout::RolloutController;
use crate::types::{
    RegressionSeverity, SignalLevel, SignalType, TrustRegressionEvent, TrustSignalMeasurement,
};

/// Default moving window width for every signal.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 3600);
/// Default sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default "sustained" interval for S3 (partial_success_rate).
pub const DEFAULT_SUSTAINED_INTERVAL: Duration = Duration::from_secs(3600);
/// Window within which more than 3 retries on one session counts as spam.
const RETRY_SPAM_WINDOW: Duration = Duration::from_secs(60);
const RETRY_SPAM_THRESHOLD: u32 = 3;

/// A critical alert category that alone forces S6 to `stop` regardless
/// of count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// A routine critical alert, counted toward the S6 threshold.
    Routine,
    /// Data observed as stale past its freshness contract.
    StaleData,
    /// A failure that produced no user-visible error.
    SilentFailure,
    /// A failure that propagated into dependent components.
    CascadeFailure,
}

impl AlertKind {
    fn forces_stop(self) -> bool {
        matches!(self, AlertKind::StaleData | AlertKind::SilentFailure | AlertKind::CascadeFailure)
    }
}

#[derive(Debug, Clone)]
struct BriefingRecord {
    at: Timestamp,
    viewed: bool,
    failed: bool,
    retried: bool,
    retry_count: u32,
    partial_failure: bool,
}

struct State {
    briefings: HashMap<String, BriefingRecord>,
    dismissals: Vec<(Timestamp, OwnerId, String)>,
    items_created: Vec<(Timestamp, OwnerId, String)>,
    alerts: Vec<(Timestamp, AlertKind)>,
    session_retries: HashMap<SessionId, Vec<Timestamp>>,
    regressions: Vec<TrustRegressionEvent>,
    measurements: Vec<TrustSignalMeasurement>,
}

/// Computes the six trust signals over a moving window and reports
/// regressions that feed the Rollout Controller's freeze decision.
///
/// Every `record_*` call is a cheap append to an in-memory ledger,
/// mirroring the append-then-summarize shape of the cost ledger; the
/// window is pruned lazily at `measure` time rather than on every write.
pub struct TrustMonitor {
    state: Mutex<State>,
    window: Duration,
    sustained_interval: Duration,
    rollout: Arc<RolloutController>,
    audit_log: Arc<AuditLog>,
    events: Arc<EventBus>,
}

impl TrustMonitor {
    /// Build a monitor with the default window and sustained interval.
    #[must_use]
    pub fn new(rollout: Arc<RolloutController>, audit_log: Arc<AuditLog>, events: Arc<EventBus>) -> Self {
        Self::with_config(rollout, audit_log, events, DEFAULT_WINDOW, DEFAULT_SUSTAINED_INTERVAL)
    }

    /// Like [`Self::new`] but overrides the moving window and S3
    /// sustained interval (Open Question OQ-trust-1).
    #[must_use]
    pub fn with_config(
        rollout: Arc<RolloutController>,
        audit_log: Arc<AuditLog>,
        events: Arc<EventBus>,
        window: Duration,
        sustained_interval: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                briefings: HashMap::new(),
                dismissals: Vec::new(),
                items_created: Vec::new(),
                alerts: Vec::new(),
                session_retries: HashMap::new(),
                regressions: Vec::new(),
                measurements: Vec::new(),
            }),
            window,
            sustained_interval,
            rollout,
            audit_log,
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record that a briefing was viewed by its recipient.
    pub fn record_briefing_viewed(&self, briefing_id: impl Into<String>) {
        let mut state = self.lock();
        let entry = state.briefings.entry(briefing_id.into()).or_insert_with(|| blank_briefing(Timestamp::now()));
        entry.viewed = true;
    }

    /// Record that a briefing failed to generate.
    pub fn record_briefing_failed(&self, briefing_id: impl Into<String>) {
        let mut state = self.lock();
        let entry = state.briefings.entry(briefing_id.into()).or_insert_with(|| blank_briefing(Timestamp::now()));
        entry.failed = true;
    }

    /// Record that one section of a briefing failed while the rest
    /// succeeded.
    pub fn record_partial_failure(&self, briefing_id: impl Into<String>) {
        let mut state = self.lock();
        let entry = state.briefings.entry(briefing_id.into()).or_insert_with(|| blank_briefing(Timestamp::now()));
        entry.partial_failure = true;
    }

    /// Record a user- or client-initiated retry. Called from the
    /// execution path. Increments both the briefing's lifetime retry
    /// count (feeds S2's "any single briefing retried > 3x" override)
    /// and a per-session 60s sliding counter; more than 3 retries inside
    /// that window records a `retry_button_spam` regression at
    /// `critical`, which freezes the rollout.
    pub async fn record_retry(
        &self,
        owner: OwnerId,
        session: SessionId,
        briefing_id: Option<String>,
        _section: Option<String>,
    ) {
        let now = Timestamp::now();
        let spam = {
            let mut state = self.lock();
            if let Some(id) = &briefing_id {
                let entry = state.briefings.entry(id.clone()).or_insert_with(|| blank_briefing(now));
                entry.viewed = true;
                entry.retried = true;
                entry.retry_count += 1;
            }
            let retries = state.session_retries.entry(session).or_default();
            retries.retain(|t| now.0.signed_duration_since(t.0).num_seconds() < RETRY_SPAM_WINDOW.as_secs() as i64);
            retries.push(now);
            retries.len() as u32 > RETRY_SPAM_THRESHOLD
        };
        if spam {
            self.record_regression(
                owner,
                "retry_button_spam",
                RegressionSeverity::Critical,
                "more than 3 retries within 60 seconds on one session",
                false,
                None,
                briefing_id,
            )
            .await;
        }
    }

    /// Record an item dismissal (S4 numerator).
    pub fn record_dismissal(&self, owner: OwnerId, item_type: impl Into<String>) {
        self.lock().dismissals.push((Timestamp::now(), owner, item_type.into()));
    }

    /// Record an item creation (S4 denominator).
    pub fn record_item_created(&self, owner: OwnerId, item_type: impl Into<String>) {
        self.lock().items_created.push((Timestamp::now(), owner, item_type.into()));
    }

    /// Record a critical trust-risk alert (S6).
    pub fn record_alert(&self, kind: AlertKind) {
        self.lock().alerts.push((Timestamp::now(), kind));
    }

    /// Record a regression event. `Critical` severity freezes the
    /// rollout through the controller this monitor was built with.
    pub async fn record_regression(
        &self,
        owner: OwnerId,
        trigger: impl Into<String>,
        severity: RegressionSeverity,
        description: impl Into<String>,
        user_reported: bool,
        user_feedback: Option<String>,
        briefing_id: Option<String>,
    ) -> TrustRegressionEvent {
        let trigger = trigger.into();
        let event = TrustRegressionEvent {
            id: RegressionId::new(),
            owner,
            trigger: trigger.clone(),
            severity,
            description: description.into(),
            user_reported,
            user_feedback,
            briefing_id,
            at: Timestamp::now(),
            resolved: false,
            resolved_at: None,
            resolution: None,
        };
        self.lock().regressions.push(event.clone());
        let audit_severity = match severity {
            RegressionSeverity::Warning => Severity::Warning,
            RegressionSeverity::Critical => Severity::Critical,
        };
        let audit_type = if user_reported { AuditEventType::TrustUserReport } else { AuditEventType::TrustBehaviorChange };
        if let Err(error) =
            self.audit_log.record(audit_type, audit_severity, format!("trust regression: {trigger}"), Some(owner)).await
        {
            tracing::warn!(%error, "failed to audit trust regression");
        }
        self.events.publish(
            "trust.regression",
            serde_json::json!({ "trigger": trigger, "severity": format!("{severity:?}") }),
        );
        if matches!(severity, RegressionSeverity::Critical) {
            self.rollout.freeze(format!("critical regression: {}", event.trigger), "trust_monitor").await;
        }
        event
    }

    /// A specialized, always-critical user report. Recording one is by
    /// itself sufficient for the Rollout Controller to freeze.
    pub async fn record_feels_wrong_report(&self, owner: OwnerId, feedback: impl Into<String>) -> TrustRegressionEvent {
        self.record_regression(owner, "feels_wrong", RegressionSeverity::Critical, "user reported feels_wrong", true, Some(feedback.into()), None)
            .await
    }

    /// Compute all six signals over the moving window ending at `now`,
    /// persist the measurements, and trigger a halt for any signal that
    /// resolves to `stop`.
    pub async fn measure(&self, now: Timestamp) -> Vec<TrustSignalMeasurement> {
        let window_start = now.plus_seconds(-(i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX)));
        let history_snapshot = { self.lock().measurements.clone() };
        let mut results = Vec::with_capacity(6);
        for signal in SignalType::ALL {
            let measurement = {
                let state = self.lock();
                self.compute_signal(&state, signal, window_start, now, &history_snapshot)
            };
            self.lock().measurements.push(measurement.clone());
            if matches!(measurement.level, SignalLevel::Stop) {
                self.record_global_stop(&measurement).await;
            }
            results.push(measurement);
        }
        results
    }

    async fn record_global_stop(&self, measurement: &TrustSignalMeasurement) {
        if let Err(error) = self
            .audit_log
            .record(
                AuditEventType::TrustSignalStop,
                Severity::Critical,
                format!("{} crossed stop threshold at {}", measurement.signal_type, measurement.value),
                None,
            )
            .await
        {
            tracing::warn!(%error, "failed to audit signal stop");
        }
        self.events.publish(
            "trust.signal_stop",
            serde_json::json!({ "signal": measurement.signal_type.to_string(), "value": measurement.value }),
        );
        self.rollout
            .trigger_halt(measurement.signal_type, measurement.value, measurement.id)
            .await;
    }

    #[allow(clippy::too_many_lines)]
    fn compute_signal(
        &self,
        state: &State,
        signal: SignalType,
        window_start: Timestamp,
        now: Timestamp,
        history: &[TrustSignalMeasurement],
    ) -> TrustSignalMeasurement {
        let in_window = |t: Timestamp| t >= window_start && t <= now;
        let (value, level, numerator, denominator, metadata) = match signal {
            SignalType::BriefingFailureRate => {
                let briefings: Vec<&BriefingRecord> = state.briefings.values().filter(|b| in_window(b.at)).collect();
                let total = briefings.len() as u64;
                let failed = briefings.iter().filter(|b| b.failed).count() as u64;
                let ratio = ratio_of(failed, total);
                let level = classify(ratio, 0.02, 0.05);
                (ratio, level, Some(failed), Some(total), None)
            },
            SignalType::RetryRate => {
                let briefings: Vec<&BriefingRecord> =
                    state.briefings.values().filter(|b| in_window(b.at) && b.viewed).collect();
                let total = briefings.len() as u64;
                let retried = briefings.iter().filter(|b| b.retried).count() as u64;
                let ratio = ratio_of(retried, total);
                let any_briefing_over_threshold = briefings.iter().any(|b| b.retry_count > 3);
                let mut level = classify(ratio, 0.10, 0.20);
                if any_briefing_over_threshold {
                    level = SignalLevel::Stop;
                }
                (ratio, level, Some(retried), Some(total), None)
            },
            SignalType::PartialSuccessRate => {
                let briefings: Vec<&BriefingRecord> = state.briefings.values().filter(|b| in_window(b.at)).collect();
                let total = briefings.len() as u64;
                let partial = briefings.iter().filter(|b| b.partial_failure).count() as u64;
                let ratio = ratio_of(partial, total);
                let raw_level = classify(ratio, 0.15, 0.30);
                let level = if matches!(raw_level, SignalLevel::Stop) && self.sustained(history, now) {
                    SignalLevel::Stop
                } else if matches!(raw_level, SignalLevel::Stop) {
                    SignalLevel::Warning
                } else {
                    raw_level
                };
                (ratio, level, Some(partial), Some(total), None)
            },
            SignalType::DismissalRate => {
                let dismissed: Vec<&(Timestamp, OwnerId, String)> =
                    state.dismissals.iter().filter(|(t, ..)| in_window(*t)).collect();
                let created: Vec<&(Timestamp, OwnerId, String)> =
                    state.items_created.iter().filter(|(t, ..)| in_window(*t)).collect();
                let total = created.len() as u64;
                let num = dismissed.len() as u64;
                let ratio = ratio_of(num, total);
                let mut counts: HashMap<(OwnerId, &str), u32> = HashMap::new();
                for (_, owner, kind) in &dismissed {
                    *counts.entry((*owner, kind.as_str())).or_insert(0) += 1;
                }
                let mut level = classify(ratio, 0.05, 0.15);
                if counts.values().any(|c| *c > 3) {
                    level = SignalLevel::Stop;
                }
                (ratio, level, Some(num), Some(total), None)
            },
            SignalType::RefreshLoops => {
                let sessions: Vec<&Vec<Timestamp>> = state.session_retries.values().collect();
                let windowed: Vec<usize> =
                    sessions.iter().map(|retries| retries.iter().filter(|t| in_window(**t)).count()).collect();
                let total_sessions = windowed.len() as u64;
                let total_retries: u64 = windowed.iter().map(|c| *c as u64).sum();
                let avg = if total_sessions == 0 { 0.0 } else { total_retries as f64 / total_sessions as f64 };
                let any_session_spam = windowed.iter().any(|c| *c > 3);
                let mut level = if avg <= 1.0 {
                    SignalLevel::Normal
                } else if avg <= 3.0 {
                    SignalLevel::Warning
                } else {
                    SignalLevel::Stop
                };
                if any_session_spam {
                    level = SignalLevel::Stop;
                }
                (avg, level, Some(total_retries), Some(total_sessions), None)
            },
            SignalType::TrustRiskAlerts => {
                let alerts: Vec<&(Timestamp, AlertKind)> = state.alerts.iter().filter(|(t, _)| in_window(*t)).collect();
                let count = alerts.len() as u64;
                let forcing = alerts.iter().find(|(_, k)| k.forces_stop()).map(|(_, k)| *k);
                let mut level = if count == 0 {
                    SignalLevel::Normal
                } else if count <= 2 {
                    SignalLevel::Warning
                } else {
                    SignalLevel::Stop
                };
                let metadata = if let Some(kind) = forcing {
                    level = SignalLevel::Stop;
                    Some(serde_json::json!({ "forcing_alert_kind": format!("{kind:?}") }))
                } else {
                    None
                };
                (count as f64, level, Some(count), None, metadata)
            },
        };
        TrustSignalMeasurement {
            id: TrustSignalId::new(),
            signal_type: signal,
            value,
            level,
            numerator,
            denominator,
            period_start: window_start,
            period_end: now,
            measured_at: now,
            metadata,
        }
    }

    fn sustained(&self, history: &[TrustSignalMeasurement], now: Timestamp) -> bool {
        let trailing_start = now.plus_seconds(-(i64::try_from(self.sustained_interval.as_secs()).unwrap_or(i64::MAX)));
        let trailing: Vec<&TrustSignalMeasurement> = history
            .iter()
            .filter(|m| m.signal_type == SignalType::PartialSuccessRate && m.measured_at >= trailing_start)
            .collect();
        !trailing.is_empty() && trailing.iter().all(|m| matches!(m.level, SignalLevel::Stop))
    }

    /// The most recent measurement for each signal, if any.
    #[must_use]
    pub fn latest(&self) -> HashMap<SignalType, TrustSignalMeasurement> {
        let state = self.lock();
        let mut latest: HashMap<SignalType, TrustSignalMeasurement> = HashMap::new();
        for measurement in &state.measurements {
            latest
                .entry(measurement.signal_type)
                .and_modify(|existing| {
                    if measurement.measured_at > existing.measured_at {
                        *existing = measurement.clone();
                    }
                })
                .or_insert_with(|| measurement.clone());
        }
        latest
    }

    /// Whether any stop-level signal, critical regression, or
    /// `feels_wrong` report was recorded on the given calendar day
    /// (`YYYY-MM-DD`, UTC).
    #[must_use]
    pub fn is_clean_day(&self, day: &str) -> bool {
        let state = self.lock();
        let any_stop = state.measurements.iter().any(|m| day_key(m.measured_at) == day && matches!(m.level, SignalLevel::Stop));
        let any_critical_regression = state
            .regressions
            .iter()
            .any(|r| day_key(r.at) == day && matches!(r.severity, RegressionSeverity::Critical));
        let any_feels_wrong = state.regressions.iter().any(|r| day_key(r.at) == day && r.trigger == "feels_wrong");
        !any_stop && !any_critical_regression && !any_feels_wrong
    }
}

fn blank_briefing(at: Timestamp) -> BriefingRecord {
    BriefingRecord { at, viewed: false, failed: false, retried: false, retry_count: 0, partial_failure: false }
}

fn ratio_of(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

fn classify(ratio: f64, normal_ceiling: f64, warning_ceiling: f64) -> SignalLevel {
    if ratio <= normal_ceiling {
        SignalLevel::Normal
    } else if ratio <= warning_ceiling {
        SignalLevel::Warning
    } else {
        SignalLevel::Stop
    }
}

fn day_key(ts: Timestamp) -> String {
    ts.0.format("%Y-%m-%d").to_string()
}

/// Spawn a periodic sweep that calls [`TrustMonitor::measure`] every
/// `interval`, stopping when the returned token is cancelled.
pub fn spawn_sweeper(monitor: Arc<TrustMonitor>, interval: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let measurements = monitor.measure(Timestamp::now()).await;
                    let stops = measurements.iter().filter(|m| matches!(m.level, SignalLevel::Stop)).count();
                    if stops > 0 {
                        tracing::warn!(stops, "trust sweep found stop-level signals");
                    }
                }
            }
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_monitor() -> (Arc<RolloutController>, TrustMonitor) {
        let audit = Arc::new(AuditLog::in_memory());
        let events = Arc::new(EventBus::new());
        let rollout = Arc::new(RolloutController::new(audit.clone(), events.clone()));
        let monitor = TrustMonitor::new(rollout.clone(), audit, events);
        (rollout, monitor)
    }

    #[tokio::test]
    async fn briefing_failure_rate_classifies_by_thresholds() {
        let (_rollout, monitor) = test_monitor();
        for i in 0..100 {
            monitor.record_briefing_viewed(format!("b{i}"));
        }
        for i in 0..10 {
            monitor.record_briefing_failed(format!("b{i}"));
        }
        let measurements = monitor.measure(Timestamp::now()).await;
        let s1 = measurements.iter().find(|m| m.signal_type == SignalType::BriefingFailureRate).unwrap();
        assert_eq!(s1.level, SignalLevel::Stop);
    }

    #[tokio::test]
    async fn single_session_retry_spam_forces_stop_and_freezes() {
        let (rollout, monitor) = test_monitor();
        let owner = OwnerId::new();
        let session = SessionId::new();
        for _ in 0..4 {
            monitor.record_retry(owner, session, Some("b1".into()), None).await;
        }
        assert!(rollout.state().freeze.frozen);
    }

    #[tokio::test]
    async fn feels_wrong_report_freezes_rollout() {
        let (rollout, monitor) = test_monitor();
        monitor.record_feels_wrong_report(OwnerId::new(), "this is scary").await;
        assert!(rollout.state().freeze.frozen);
    }

    #[tokio::test]
    async fn clean_day_requires_no_stop_signal_or_critical_regression() {
        let (_rollout, monitor) = test_monitor();
        let now = Timestamp::now();
        let day = day_key(now);
        assert!(monitor.is_clean_day(&day));
        monitor.record_alert(AlertKind::CascadeFailure);
        let _ = monitor.measure(now).await;
        assert!(!monitor.is_clean_day(&day));
    }

    #[test]
    fn ratio_of_handles_zero_denominator() {
        assert_eq!(ratio_of(0, 0), 0.0);
    }
}
