//! Configuration types for the Sentry gateway.
//!
//! All types here are self-contained with no dependencies on other internal
//! `sentry-*` crates. Conversion from config sections to the constructor
//! arguments each service actually takes happens at the gateway's startup
//! boundary. Every struct implements [`Default`] with the same defaults its
//! corresponding service uses when unconfigured, so a bare `[section]`
//! header in TOML produces a working configuration.

use std::collections::HashMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

/// Root configuration for the Sentry gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daemon bind address and connection limits.
    pub gateway: GatewaySection,
    /// Session token lifetimes.
    pub auth: AuthSection,
    /// Named LLM provider definitions, keyed by provider id.
    pub providers: HashMap<String, ProviderSection>,
    /// Model Router thresholds and fallback order.
    pub router: RouterSection,
    /// Context Compressor, Prompt Cache, and Request Batcher knobs.
    pub pipeline: PipelineSection,
    /// Cost Tracker budgets and alert thresholds.
    pub cost: CostSection,
    /// Approval Queue and Execution/Undo Manager timing.
    pub approval: ApprovalSection,
    /// Trust Monitor windows.
    pub trust: TrustSection,
    /// GC Scheduler interval.
    pub gc: GcSection,
    /// Audit log storage.
    pub audit: AuditSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Daemon bind address and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Address the gateway's control API binds to.
    pub bind_addr: String,
    /// Unix domain socket path, if the gateway also exposes one.
    pub socket_path: Option<String>,
    /// Maximum concurrent device connections.
    pub max_connections: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:8787".to_owned(), socket_path: None, max_connections: 64 }
    }
}

/// Session token lifetimes, mirroring `sentry_auth::session`'s defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl_secs: i64,
    /// Device-pairing code lifetime in seconds.
    pub pairing_code_ttl_secs: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self { access_token_ttl_secs: 15 * 60, refresh_token_ttl_secs: 7 * 24 * 60 * 60, pairing_code_ttl_secs: 10 * 60 }
    }
}

/// One LLM provider's endpoint, credentials, and sampling defaults.
///
/// `api_key` and `api_base_url` are omitted from `Debug` and `Serialize`
/// output; only whether they're set is shown. Prefer the Credential
/// Store (C1) for API keys over writing them into a config file.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Model name sent to the provider API.
    pub model: String,
    /// Inline API key override. Leave unset to resolve via the
    /// Credential Store instead.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL override, for OpenAI-compatible or self-hosted endpoints.
    #[serde(skip_serializing)]
    pub api_base_url: Option<String>,
    /// Maximum tokens requested per completion.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f64,
    /// Context window size in tokens, when the provider doesn't expose one.
    pub context_window: Option<usize>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key: None,
            api_base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            context_window: None,
        }
    }
}

impl std::fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSection")
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("has_api_base_url", &self.api_base_url.is_some())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("context_window", &self.context_window)
            .finish()
    }
}

impl Serialize for ProviderSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProviderSection", 4)?;
        state.serialize_field("model", &self.model)?;
        state.serialize_field("max_tokens", &self.max_tokens)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.serialize_field("context_window", &self.context_window)?;
        state.end()
    }
}

/// Model Router thresholds and fallback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// Provider id consulted first for a request.
    pub default_provider: String,
    /// Providers tried in order when `default_provider` fails or is unhealthy.
    pub fallback_chain: Vec<String>,
    /// Prompt complexity score above which the router prefers a
    /// larger/more capable model.
    pub complexity_threshold: f64,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self { default_provider: "local".to_owned(), fallback_chain: Vec::new(), complexity_threshold: 0.6 }
    }
}

/// Context Compressor, Prompt Cache, and Request Batcher knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Maximum entries kept in the merged prompt cache/deduplicator.
    pub prompt_cache_max_entries: usize,
    /// Prompt cache entry time-to-live in seconds.
    pub prompt_cache_ttl_secs: u64,
    /// Deduplicator entry time-to-live in seconds (shorter-lived than
    /// the prompt cache entries it shares storage with).
    pub dedup_cache_ttl_secs: u64,
    /// How long the batcher waits to accumulate a batch, in milliseconds.
    pub batch_window_ms: u64,
    /// Maximum requests per batch.
    pub batch_max_size: usize,
    /// Token budget the context compressor targets.
    pub context_token_budget: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            prompt_cache_max_entries: 1000,
            prompt_cache_ttl_secs: 15 * 60,
            dedup_cache_ttl_secs: 30,
            batch_window_ms: 100,
            batch_max_size: 10,
            context_token_budget: 8000,
        }
    }
}

/// Cost Tracker budgets and alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSection {
    /// Daily spend ceiling in USD.
    pub daily_budget_usd: f64,
    /// Weekly spend ceiling in USD.
    pub weekly_budget_usd: f64,
    /// Monthly spend ceiling in USD.
    pub monthly_budget_usd: f64,
    /// Percentage of a budget that triggers a warning alert.
    pub alert_threshold_pct: f64,
}

impl Default for CostSection {
    fn default() -> Self {
        Self { daily_budget_usd: 5.0, weekly_budget_usd: 25.0, monthly_budget_usd: 80.0, alert_threshold_pct: 80.0 }
    }
}

/// Approval Queue and Execution/Undo Manager timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Default time-to-live for a pending approval, in seconds.
    pub default_ttl_secs: u64,
    /// How long after execution an action may still be undone, in seconds.
    pub undo_window_secs: u64,
    /// Interval between expiry sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// How long completed audit-trail rows are retained, in seconds.
    pub history_retention_secs: u64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self { default_ttl_secs: 300, undo_window_secs: 30, sweep_interval_secs: 15, history_retention_secs: 30 * 24 * 60 * 60 }
    }
}

/// Trust Monitor windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSection {
    /// Rolling window over which signals are measured, in seconds.
    pub window_secs: u64,
    /// How long a signal must stay at `Stop` level to count as sustained,
    /// in seconds.
    pub sustained_interval_secs: u64,
    /// Interval between measurement passes, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for TrustSection {
    fn default() -> Self {
        Self { window_secs: 24 * 60 * 60, sustained_interval_secs: 60 * 60, sweep_interval_secs: 5 * 60 }
    }
}

/// GC Scheduler interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcSection {
    /// Interval between scheduled GC passes, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for GcSection {
    fn default() -> Self {
        Self { sweep_interval_secs: 5 * 60 }
    }
}

/// Audit log storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Path to the audit log's storage file. `None` uses an in-memory
    /// store, which does not survive a restart.
    pub storage_path: Option<String>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self { storage_path: None }
    }
}

/// Logging level, format, and per-crate directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty`, `compact`, or `json`.
    pub format: String,
    /// Additional `tracing-subscriber` `EnvFilter` directives, e.g.
    /// `"sentry_router=debug"`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: "pretty".to_owned(), directives: Vec::new() }
    }
}
