//! Entities for per-call cost accounting and budget roll-ups.

use std::collections::HashMap;

use sentry_core::{CostEntryId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single metered call. Append-only once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    /// Opaque identifier.
    pub id: CostEntryId,
    /// When the call completed.
    pub timestamp: Timestamp,
    /// Provider name, e.g. `anthropic`.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Input tokens billed.
    pub input_tokens: u64,
    /// Output tokens billed.
    pub output_tokens: u64,
    /// Cost of this call in US dollars.
    pub cost_usd: f64,
    /// Caller-supplied classification, e.g. `"chat"` or `"summarize"`.
    pub task_type: Option<String>,
    /// Arbitrary caller-supplied metadata.
    pub metadata: Option<Value>,
}

impl CostEntry {
    /// Build a new entry stamped with the current time.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    ) -> Self {
        Self {
            id: CostEntryId::new(),
            timestamp: Timestamp::now(),
            provider: provider.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            cost_usd,
            task_type: None,
            metadata: None,
        }
    }
}

/// The roll-up window a summary or utilization figure is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// The current UTC calendar day.
    Day,
    /// The current ISO week.
    Week,
    /// The current UTC calendar month.
    Month,
    /// Every entry ever recorded.
    All,
}

/// Sum of cost entries over a period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    /// Sum of `cost_usd` across matching entries.
    pub total_cost: f64,
    /// Sum of `cost_usd`, keyed by provider.
    pub by_provider: HashMap<String, f64>,
    /// Sum of `cost_usd`, keyed by model.
    pub by_model: HashMap<String, f64>,
    /// Sum of `input_tokens` across matching entries.
    pub total_input: u64,
    /// Sum of `output_tokens` across matching entries.
    pub total_output: u64,
}

/// Optional spending caps and the thresholds that trigger a notification
/// as utilization crosses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Cap on the current calendar day's spend, in USD.
    pub daily_limit: Option<f64>,
    /// Cap on the current ISO week's spend, in USD.
    pub weekly_limit: Option<f64>,
    /// Cap on the current calendar month's spend, in USD.
    pub monthly_limit: Option<f64>,
    /// Percentages (e.g. `[50, 75, 90]`) that trigger a one-time
    /// notification the first time utilization crosses each, per period,
    /// per period instance.
    pub alert_thresholds: Vec<u8>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { daily_limit: None, weekly_limit: None, monthly_limit: None, alert_thresholds: vec![50, 75, 90] }
    }
}

impl BudgetConfig {
    /// The configured limit for `period`, if any. `All` has no limit.
    #[must_use]
    pub fn limit_for(&self, period: Period) -> Option<f64> {
        match period {
            Period::Day => self.daily_limit,
            Period::Week => self.weekly_limit,
            Period::Month => self.monthly_limit,
            Period::All => None,
        }
    }
}

/// Budget utilization for a single period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utilization {
    /// The period this figure covers.
    pub period: Period,
    /// Spend so far within the period.
    pub used: f64,
    /// The configured limit.
    pub limit: f64,
    /// `used / limit`.
    pub utilization: f64,
}

/// Emitted the first time utilization crosses a configured alert
/// threshold within a given period instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetNotification {
    /// The period the crossing occurred in.
    pub period: Period,
    /// The threshold percentage crossed, e.g. `75`.
    pub threshold_percent: u8,
    /// Utilization at the moment of crossing.
    pub utilization: f64,
    /// When the notification was generated.
    pub at: Timestamp,
}
