//! Request/response shapes for the Provider Adapter (C3) and Health
//! Cache (C4), per the `Model Config` / `Provider Status` / `Cost
//! Entry`-adjacent usage entities.

use sentry_core::{ConversationTurn, Timestamp};
use serde::{Deserialize, Serialize};

/// Default characters-per-token ratio used when a provider omits usage
/// counts: `ceil(char_count / chars_per_token)`.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Health-check request timeout.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;
/// Non-streaming request timeout.
pub const COMPLETE_TIMEOUT_SECS: u64 = 60;
/// Streaming request timeout.
pub const STREAM_TIMEOUT_SECS: u64 = 120;

/// How quickly a model typically responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    /// Sub-second to a few seconds.
    Fast,
    /// Several seconds.
    Medium,
    /// Tens of seconds or more.
    Slow,
}

/// Subjective output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Adequate for simple tasks.
    Basic,
    /// Solid general-purpose quality.
    Good,
    /// Best available.
    Excellent,
}

/// Closed capability record a model declares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capabilities {
    /// Can write code.
    pub code_generation: bool,
    /// Can explain existing code.
    pub code_explanation: bool,
    /// Handles multi-step reasoning well.
    pub reasoning: bool,
    /// Handles open-ended creative tasks.
    pub creativity: bool,
    /// Typical response speed.
    pub speed: Speed,
    /// Typical output quality.
    pub quality: Quality,
}

/// One entry in a provider's model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name this model belongs to.
    pub provider: String,
    /// Provider-internal model identifier.
    pub model_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Maximum context window in tokens.
    pub context_window: usize,
    /// Cost per 1,000 input tokens, USD. Zero for local models.
    pub cost_per_1k_input: f64,
    /// Cost per 1,000 output tokens, USD. Zero for local models.
    pub cost_per_1k_output: f64,
    /// Whether this model runs on local hardware (implies zero cost).
    pub is_local: bool,
    /// Declared capability profile.
    pub capabilities: Capabilities,
}

impl ModelConfig {
    /// A local model's costs must both be zero; this is the invariant
    /// checker a catalog loader uses to reject a misconfigured entry.
    #[must_use]
    pub fn respects_local_cost_invariant(&self) -> bool {
        !self.is_local || (self.cost_per_1k_input == 0.0 && self.cost_per_1k_output == 0.0)
    }
}

/// A point-in-time liveness snapshot for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Provider name.
    pub provider: String,
    /// Whether the provider answered a health probe successfully.
    pub available: bool,
    /// Probe round-trip time, if the probe succeeded.
    pub latency_ms: Option<u64>,
    /// When this snapshot was taken.
    pub checked_at: Timestamp,
    /// Model ids this provider currently serves.
    pub available_models: Vec<String>,
    /// Probe failure description, if `available` is false.
    pub error: Option<String>,
}

impl ProviderStatus {
    /// A snapshot is stale past this age; see [`crate::health::HealthCache`].
    pub const STALE_AFTER_SECS: i64 = 30;

    /// Whether this snapshot is older than [`Self::STALE_AFTER_SECS`].
    #[must_use]
    pub fn is_stale(&self) -> bool {
        Timestamp::now().unix_timestamp() - self.checked_at.unix_timestamp()
            > Self::STALE_AFTER_SECS
    }
}

/// Why a model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Hit the max-token budget.
    Length,
    /// Stopped to emit a tool call.
    ToolCall,
    /// Caller's cancellation token fired.
    Cancelled,
    /// The adapter could not complete the request; see the response's
    /// `error` field. Per C3's never-raise contract this is returned,
    /// not propagated as an `Err`.
    Error,
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens consumed.
    pub input_tokens: usize,
    /// Generated tokens.
    pub output_tokens: usize,
}

impl Usage {
    /// All-zero usage, used on the error path.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Total tokens billed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A completion request handed to a [`crate::provider::LlmProvider`].
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Ordered turns forming the conversation so far.
    pub turns: Vec<ConversationTurn>,
    /// System preamble, if any.
    pub system: Option<String>,
    /// Sampling temperature, 0.0-1.0.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
}

impl CompletionRequest {
    /// Build a request from a single user turn with default sampling.
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::new(sentry_core::Role::User, prompt, 0)],
            system: None,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// The result of a (possibly failed) completion. Never an `Err` — see
/// `crate::provider::LlmProvider::complete`'s doc comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Model that produced this response, or `"none"` on total failure.
    pub model: String,
    /// Generated text. Empty on the error path.
    pub content: String,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token accounting; all zero when `finish_reason == Error`.
    pub usage: Usage,
    /// Failure description, set only when `finish_reason == Error`.
    pub error: Option<String>,
}

impl ModelResponse {
    /// Build the synthetic error response the adapter returns instead
    /// of raising.
    #[must_use]
    pub fn error(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: String::new(),
            finish_reason: FinishReason::Error,
            usage: Usage::zero(),
            error: Some(message.into()),
        }
    }

    /// Whether this response represents a successful completion.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.finish_reason == FinishReason::Error
    }
}

/// One chunk of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental text content, if any arrived in this chunk.
    pub delta: Option<String>,
    /// Set to `true` on the terminal chunk, which also carries `usage`.
    pub done: bool,
    /// Populated once `done`; zero otherwise.
    pub usage: Usage,
    /// Set on the terminal chunk.
    pub finish_reason: Option<FinishReason>,
    /// Failure description, set only when `finish_reason == Some(Error)`.
    pub error: Option<String>,
}

impl StreamChunk {
    /// A non-terminal content delta.
    #[must_use]
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: Some(text.into()),
            done: false,
            usage: Usage::zero(),
            finish_reason: None,
            error: None,
        }
    }

    /// The terminal chunk carrying final usage totals.
    #[must_use]
    pub fn done(usage: Usage, finish_reason: FinishReason) -> Self {
        Self { delta: None, done: true, usage, finish_reason: Some(finish_reason), error: None }
    }

    /// A terminal chunk representing mid-stream failure. Per C3's
    /// never-raise contract this is returned as an ordinary item, not
    /// an `Err`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delta: None,
            done: true,
            usage: Usage::zero(),
            finish_reason: Some(FinishReason::Error),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_model_must_be_free() {
        let cfg = ModelConfig {
            provider: "local".into(),
            model_id: "llama".into(),
            display_name: "Llama".into(),
            context_window: 8192,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
            is_local: true,
            capabilities: Capabilities {
                code_generation: true,
                code_explanation: true,
                reasoning: true,
                creativity: true,
                speed: Speed::Fast,
                quality: Quality::Good,
            },
        };
        assert!(cfg.respects_local_cost_invariant());
        let mut paid_local = cfg;
        paid_local.cost_per_1k_input = 0.002;
        assert!(!paid_local.respects_local_cost_invariant());
    }

    #[test]
    fn stale_snapshot_is_detected() {
        let status = ProviderStatus {
            provider: "test".into(),
            available: true,
            latency_ms: Some(10),
            checked_at: Timestamp::now().plus_seconds(-60),
            available_models: vec![],
            error: None,
        };
        assert!(status.is_stale());
    }

    #[test]
    fn error_response_has_zero_usage() {
        let resp = ModelResponse::error("none", "all models failed or unavailable");
        assert!(resp.is_error());
        assert_eq!(resp.usage.total(), 0);
    }
}
