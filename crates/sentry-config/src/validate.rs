//! Post-merge configuration validation.
//!
//! Validates that a deserialized [`Config`] has values within acceptable
//! ranges and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_providers(config)?;
    validate_router(config)?;
    validate_pipeline(config)?;
    validate_cost(config)?;
    validate_approval(config)?;
    validate_trust(config)?;
    validate_logging(config)?;
    Ok(())
}

fn field_error(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError { field: field.to_owned(), message: message.into() }
}

fn validate_providers(config: &Config) -> ConfigResult<()> {
    for (id, provider) in &config.providers {
        if !(0.0..=2.0).contains(&provider.temperature) {
            return Err(field_error(
                &format!("providers.{id}.temperature"),
                format!("temperature {} is out of range; must be between 0.0 and 2.0", provider.temperature),
            ));
        }
        if provider.max_tokens == 0 {
            return Err(field_error(&format!("providers.{id}.max_tokens"), "must be greater than zero"));
        }
    }
    Ok(())
}

fn validate_router(config: &Config) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&config.router.complexity_threshold) {
        return Err(field_error("router.complexity_threshold", "must be between 0.0 and 1.0"));
    }
    Ok(())
}

fn validate_pipeline(config: &Config) -> ConfigResult<()> {
    let p = &config.pipeline;
    if p.prompt_cache_max_entries == 0 {
        return Err(field_error("pipeline.prompt_cache_max_entries", "must be greater than zero"));
    }
    if p.batch_max_size == 0 {
        return Err(field_error("pipeline.batch_max_size", "must be greater than zero"));
    }
    if p.context_token_budget == 0 {
        return Err(field_error("pipeline.context_token_budget", "must be greater than zero"));
    }
    Ok(())
}

fn validate_cost(config: &Config) -> ConfigResult<()> {
    let c = &config.cost;
    if c.daily_budget_usd <= 0.0 || c.weekly_budget_usd <= 0.0 || c.monthly_budget_usd <= 0.0 {
        return Err(field_error("cost", "budgets must be greater than zero"));
    }
    if c.daily_budget_usd > c.weekly_budget_usd {
        return Err(field_error("cost.daily_budget_usd", "cannot exceed weekly_budget_usd"));
    }
    if c.weekly_budget_usd > c.monthly_budget_usd {
        return Err(field_error("cost.weekly_budget_usd", "cannot exceed monthly_budget_usd"));
    }
    if !(0.0..=100.0).contains(&c.alert_threshold_pct) {
        return Err(field_error("cost.alert_threshold_pct", "must be between 0 and 100"));
    }
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;
    if a.default_ttl_secs == 0 {
        return Err(field_error("approval.default_ttl_secs", "must be greater than zero"));
    }
    if a.sweep_interval_secs == 0 {
        return Err(field_error("approval.sweep_interval_secs", "must be greater than zero"));
    }
    Ok(())
}

fn validate_trust(config: &Config) -> ConfigResult<()> {
    let t = &config.trust;
    if t.window_secs == 0 || t.sustained_interval_secs == 0 || t.sweep_interval_secs == 0 {
        return Err(field_error("trust", "all windows and intervals must be greater than zero"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    if !matches!(config.logging.level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        return Err(field_error(
            "logging.level",
            format!("unrecognized level '{}'; expected trace, debug, info, warn, or error", config.logging.level),
        ));
    }
    if !matches!(config.logging.format.as_str(), "pretty" | "compact" | "json") {
        return Err(field_error(
            "logging.format",
            format!("unrecognized format '{}'; expected pretty, compact, or json", config.logging.format),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn daily_budget_exceeding_weekly_is_rejected() {
        let mut config = Config::default();
        config.cost.daily_budget_usd = 100.0;
        config.cost.weekly_budget_usd = 25.0;
        assert!(matches!(validate(&config), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn unrecognized_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        assert!(matches!(validate(&config), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let mut config = Config::default();
        config.trust.sweep_interval_secs = 0;
        assert!(matches!(validate(&config), Err(ConfigError::ValidationError { .. })));
    }
}
