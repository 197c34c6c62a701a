//! Converts [`sentry_config::Config`] sections into the constructor
//! arguments each service crate takes. This is the integration boundary
//! `sentry-config`'s own design notes call out: the config crate has no
//! internal-crate dependencies, so nothing but the gateway knows how a
//! `PipelineSection` becomes a `CompressorConfig`+`BatcherConfig`, or how
//! an `AuthSection` becomes a `KdfParams`.

use std::time::Duration;

use sentry_approval::RiskScorerConfig;
use sentry_config::Config;
use sentry_cost::BudgetConfig;
use sentry_crypto::KdfParams;
use sentry_pipeline::{BatcherConfig, CompressorConfig};
use sentry_router::{Complexity, RoutingConfig, RoutingRules};
use sentry_telemetry::{LogConfig, LogFormat};

/// KDF parameters for the Credential Store. `sentry-config` does not
/// carry Argon2 cost parameters (they're a deployment-time secret-adjacent
/// constant, not an operator tunable), so this always returns the
/// defaults; the seed itself is read separately at startup.
#[must_use]
pub fn kdf_params(_config: &Config) -> KdfParams {
    KdfParams::default()
}

/// Compressor tunables from `pipeline.context_token_budget`.
#[must_use]
pub fn compressor_config(config: &Config) -> CompressorConfig {
    CompressorConfig {
        max_context_tokens: config.pipeline.context_token_budget,
        ..CompressorConfig::default()
    }
}

/// Batcher tunables from `pipeline.batch_window_ms`/`batch_max_size`.
#[must_use]
pub fn batcher_config(config: &Config) -> BatcherConfig {
    BatcherConfig {
        max_batch_size: config.pipeline.batch_max_size,
        max_wait_ms: config.pipeline.batch_window_ms,
        ..BatcherConfig::default()
    }
}

/// Prompt cache entry lifetime, derived from `pipeline.prompt_cache_ttl_secs`.
#[must_use]
pub fn prompt_cache_ttl(config: &Config) -> Duration {
    Duration::from_secs(config.pipeline.prompt_cache_ttl_secs)
}

/// Prompt cache capacity, from `pipeline.prompt_cache_max_entries`.
#[must_use]
pub fn prompt_cache_max_entries(config: &Config) -> usize {
    config.pipeline.prompt_cache_max_entries
}

/// Deduplicator entry lifetime, from `pipeline.dedup_cache_ttl_secs`.
#[must_use]
pub fn dedup_ttl(config: &Config) -> Duration {
    Duration::from_secs(config.pipeline.dedup_cache_ttl_secs)
}

/// Cost Tracker budgets, from the `cost` section.
#[must_use]
pub fn budget_config(config: &Config) -> BudgetConfig {
    BudgetConfig {
        daily_limit: Some(config.cost.daily_budget_usd),
        weekly_limit: Some(config.cost.weekly_budget_usd),
        monthly_limit: Some(config.cost.monthly_budget_usd),
        alert_thresholds: vec![config.cost.alert_threshold_pct.round() as u8],
    }
}

/// Router thresholds and fallback order, from the `router` section.
/// `routing_rules` (per-complexity candidate lists) has no config-file
/// representation yet (Open Question in `DESIGN.md`); it starts empty
/// and is populated from the provider catalog at assembly time.
#[must_use]
pub fn routing_config(config: &Config, routing_rules: RoutingRules) -> RoutingConfig {
    RoutingConfig {
        routing_rules,
        fallback_chain: config.router.fallback_chain.iter().filter_map(|s| s.parse().ok()).collect(),
        max_latency_ms: None,
        auto_detect_complexity: true,
    }
}

/// The default complexity bucket used when a caller supplies no
/// preference and auto-detection is disabled.
pub const DEFAULT_COMPLEXITY: Complexity = Complexity::Moderate;

/// Risk scorer config: `sentry-config` carries no deny-list overrides
/// yet, so this is always the built-in default pattern set.
#[must_use]
pub fn risk_scorer_config(_config: &Config) -> RiskScorerConfig {
    RiskScorerConfig::default()
}

/// Approval Queue default TTL, from `approval.default_ttl_secs`.
#[must_use]
pub fn approval_default_ttl(config: &Config) -> Duration {
    Duration::from_secs(config.approval.default_ttl_secs)
}

/// Execution/Undo Manager undo window, from `approval.undo_window_secs`.
#[must_use]
pub fn undo_window(config: &Config) -> Duration {
    Duration::from_secs(config.approval.undo_window_secs)
}

/// Approval sweep interval, from `approval.sweep_interval_secs`.
#[must_use]
pub fn approval_sweep_interval(config: &Config) -> Duration {
    Duration::from_secs(config.approval.sweep_interval_secs)
}

/// History row retention, from `approval.history_retention_secs`.
#[must_use]
pub fn approval_history_retention(config: &Config) -> Duration {
    Duration::from_secs(config.approval.history_retention_secs)
}

/// Trust Monitor window and sustained interval, from the `trust` section.
#[must_use]
pub fn trust_window(config: &Config) -> Duration {
    Duration::from_secs(config.trust.window_secs)
}

/// Trust Monitor sustained interval, from `trust.sustained_interval_secs`.
#[must_use]
pub fn trust_sustained_interval(config: &Config) -> Duration {
    Duration::from_secs(config.trust.sustained_interval_secs)
}

/// Trust Monitor sweep interval, from `trust.sweep_interval_secs`.
#[must_use]
pub fn trust_sweep_interval(config: &Config) -> Duration {
    Duration::from_secs(config.trust.sweep_interval_secs)
}

/// GC sweep interval, from `gc.sweep_interval_secs`.
#[must_use]
pub fn gc_sweep_interval(config: &Config) -> Duration {
    Duration::from_secs(config.gc.sweep_interval_secs)
}

/// Access/refresh token lifetimes, from the `auth` section.
#[must_use]
pub fn access_token_ttl(config: &Config) -> i64 {
    config.auth.access_token_ttl_secs
}

/// Logging configuration, from the `logging` section.
#[must_use]
pub fn log_config(config: &Config) -> LogConfig {
    let format = match config.logging.format.as_str() {
        "compact" => LogFormat::Compact,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Pretty,
    };
    let mut log_config = LogConfig::new(&config.logging.level).with_format(format);
    for directive in &config.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    log_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batcher_config_follows_pipeline_section() {
        let config = Config::default();
        let batcher = batcher_config(&config);
        assert_eq!(batcher.max_batch_size, config.pipeline.batch_max_size);
        assert_eq!(batcher.max_wait_ms, config.pipeline.batch_window_ms);
    }

    #[test]
    fn budget_config_mirrors_cost_section() {
        let config = Config::default();
        let budget = budget_config(&config);
        assert_eq!(budget.daily_limit, Some(config.cost.daily_budget_usd));
    }

    #[test]
    fn log_config_defaults_to_pretty() {
        let config = Config::default();
        let log = log_config(&config);
        assert_eq!(log.format, LogFormat::Pretty);
    }
}
