//! Append-only cost ledger with period roll-ups and budget alerting.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};
use sentry_core::Timestamp;

use crate::types::{BudgetConfig, BudgetNotification, CostEntry, CostSummary, Period, Utilization};

fn day_key(ts: Timestamp) -> String {
    ts.0.format("%Y-%m-%d").to_string()
}

fn week_key(ts: Timestamp) -> String {
    let iso = ts.0.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

fn month_key(ts: Timestamp) -> String {
    ts.0.format("%Y-%m").to_string()
}

fn period_key(period: Period, now: Timestamp) -> String {
    match period {
        Period::Day => day_key(now),
        Period::Week => week_key(now),
        Period::Month => month_key(now),
        Period::All => "all".to_string(),
    }
}

fn in_period(entry_ts: Timestamp, now: Timestamp, period: Period) -> bool {
    match period {
        Period::Day => day_key(entry_ts) == day_key(now),
        Period::Week => week_key(entry_ts) == week_key(now),
        Period::Month => month_key(entry_ts) == month_key(now),
        Period::All => true,
    }
}

fn days_in_month(year: i32, month: u32) -> i64 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid calendar month");
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid calendar month");
    (next_first - first).num_days()
}

/// Tracks metered calls and raises alerts as spend crosses configured
/// thresholds within a day, week, or month.
pub struct CostTracker {
    entries: Mutex<Vec<CostEntry>>,
    budget: BudgetConfig,
    fired: Mutex<HashMap<(Period, String), HashSet<u8>>>,
}

impl CostTracker {
    /// Build a tracker with the given budget configuration.
    #[must_use]
    pub fn new(budget: BudgetConfig) -> Self {
        Self { entries: Mutex::new(Vec::new()), budget, fired: Mutex::new(HashMap::new()) }
    }

    /// The active budget configuration.
    #[must_use]
    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    /// Append an entry and return any budget notifications it newly
    /// triggers across the day/week/month windows.
    pub fn record(&self, entry: CostEntry) -> Vec<BudgetNotification> {
        let now = entry.timestamp;
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entry);
        self.check_thresholds(now)
    }

    /// Reduce all entries falling within `period` (relative to `now`) into
    /// a summary.
    #[must_use]
    pub fn summary(&self, period: Period, now: Timestamp) -> CostSummary {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut summary = CostSummary::default();
        for entry in entries.iter().filter(|e| in_period(e.timestamp, now, period)) {
            summary.total_cost += entry.cost_usd;
            summary.total_input += entry.input_tokens;
            summary.total_output += entry.output_tokens;
            *summary.by_provider.entry(entry.provider.clone()).or_insert(0.0) += entry.cost_usd;
            *summary.by_model.entry(entry.model.clone()).or_insert(0.0) += entry.cost_usd;
        }
        summary
    }

    /// Utilization for `period`, or `None` if no limit is configured for it.
    #[must_use]
    pub fn utilization(&self, period: Period, now: Timestamp) -> Option<Utilization> {
        let limit = self.budget.limit_for(period)?;
        let used = self.summary(period, now).total_cost;
        let utilization = if limit > 0.0 { used / limit } else { 0.0 };
        Some(Utilization { period, used, limit, utilization })
    }

    /// Like [`Self::utilization`], but surfaces the absence of a
    /// configured limit as an error rather than silently returning
    /// `None`; useful for callers that require a budget to be set for
    /// the period they're reporting on.
    pub fn utilization_or_err(&self, period: Period, now: Timestamp) -> crate::error::CostResult<Utilization> {
        self.utilization(period, now).ok_or(crate::error::CostError::NoLimitConfigured(period))
    }

    /// Projected total spend for the calendar month containing `now`,
    /// extrapolated linearly from the month-to-date spend.
    #[must_use]
    pub fn projected_monthly_spend(&self, now: Timestamp) -> f64 {
        let monthly_so_far = self.summary(Period::Month, now).total_cost;
        let days_elapsed = i64::from(now.0.day()).max(1);
        let total_days = days_in_month(now.0.year(), now.0.month());
        monthly_so_far * (total_days as f64 / days_elapsed as f64)
    }

    fn check_thresholds(&self, now: Timestamp) -> Vec<BudgetNotification> {
        let mut notifications = Vec::new();
        let mut sorted_thresholds = self.budget.alert_thresholds.clone();
        sorted_thresholds.sort_unstable();

        for &period in &[Period::Day, Period::Week, Period::Month] {
            let Some(util) = self.utilization(period, now) else { continue };
            let key = (period, period_key(period, now));
            let mut fired = self.fired.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let fired_for_period = fired.entry(key).or_default();
            let percent_used = util.utilization * 100.0;
            for &threshold in &sorted_thresholds {
                if percent_used >= f64::from(threshold) && fired_for_period.insert(threshold) {
                    notifications.push(BudgetNotification {
                        period,
                        threshold_percent: threshold,
                        utilization: util.utilization,
                        at: now,
                    });
                }
            }
        }
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_cost(cost: f64) -> CostEntry {
        CostEntry::new("anthropic", "claude-3.5-sonnet", 100, 50, cost)
    }

    #[test]
    fn summary_sums_by_provider_and_model() {
        let tracker = CostTracker::new(BudgetConfig::default());
        tracker.record(entry_with_cost(1.0));
        tracker.record(entry_with_cost(2.0));
        let summary = tracker.summary(Period::All, Timestamp::now());
        assert!((summary.total_cost - 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.by_provider["anthropic"], 3.0);
        assert_eq!(summary.total_input, 200);
    }

    #[test]
    fn utilization_is_none_without_a_limit() {
        let tracker = CostTracker::new(BudgetConfig::default());
        assert!(tracker.utilization(Period::Day, Timestamp::now()).is_none());
        assert!(tracker.utilization_or_err(Period::Day, Timestamp::now()).is_err());
    }

    #[test]
    fn utilization_reflects_limit() {
        let budget = BudgetConfig { daily_limit: Some(10.0), ..BudgetConfig::default() };
        let tracker = CostTracker::new(budget);
        tracker.record(entry_with_cost(5.0));
        let util = tracker.utilization(Period::Day, Timestamp::now()).unwrap();
        assert!((util.utilization - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_crossing_fires_exactly_once() {
        let budget = BudgetConfig { daily_limit: Some(10.0), alert_thresholds: vec![50], ..BudgetConfig::default() };
        let tracker = CostTracker::new(budget);

        let first = tracker.record(entry_with_cost(6.0));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].threshold_percent, 50);

        let second = tracker.record(entry_with_cost(1.0));
        assert!(second.is_empty());
    }

    #[test]
    fn multiple_thresholds_fire_independently() {
        let budget =
            BudgetConfig { daily_limit: Some(10.0), alert_thresholds: vec![50, 75, 90], ..BudgetConfig::default() };
        let tracker = CostTracker::new(budget);

        let notifications = tracker.record(entry_with_cost(9.5));
        let fired: Vec<u8> = notifications.iter().map(|n| n.threshold_percent).collect();
        assert_eq!(fired, vec![50, 75, 90]);
    }

    #[test]
    fn projected_monthly_spend_extrapolates() {
        let tracker = CostTracker::new(BudgetConfig::default());
        tracker.record(entry_with_cost(30.0));
        let now = Timestamp::now();
        let days_elapsed = i64::from(now.0.day()).max(1);
        let total_days = days_in_month(now.0.year(), now.0.month());
        let projected = tracker.projected_monthly_spend(now);
        let expected = 30.0 * (total_days as f64 / days_elapsed as f64);
        assert!((projected - expected).abs() < 1e-9);
    }
}
