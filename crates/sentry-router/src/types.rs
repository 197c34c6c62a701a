//! Routing configuration and the complexity classification it's driven by.

use sentry_core::ModelSpec;
use serde::{Deserialize, Serialize};

/// The three buckets a prompt is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Short, well-understood requests (lookups, summaries, translations).
    Simple,
    /// Anything that doesn't clearly fall into the other two buckets.
    Moderate,
    /// Requests that name analysis, design, security, or algorithmic work.
    Complex,
}

/// Ordered candidate model specs per complexity bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingRules {
    /// Candidates tried for [`Complexity::Simple`] requests.
    pub simple: Vec<ModelSpec>,
    /// Candidates tried for [`Complexity::Moderate`] requests.
    pub moderate: Vec<ModelSpec>,
    /// Candidates tried for [`Complexity::Complex`] requests.
    pub complex: Vec<ModelSpec>,
}

impl RoutingRules {
    /// The primary candidate list for a classified complexity.
    #[must_use]
    pub fn for_complexity(&self, complexity: Complexity) -> &[ModelSpec] {
        match complexity {
            Complexity::Simple => &self.simple,
            Complexity::Moderate => &self.moderate,
            Complexity::Complex => &self.complex,
        }
    }
}

/// Static configuration for the router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Primary candidates per complexity bucket.
    pub routing_rules: RoutingRules,
    /// Candidates appended after the primary list, tried in order.
    pub fallback_chain: Vec<ModelSpec>,
    /// Soft latency budget; currently advisory (surfaced to callers, not
    /// enforced as a hard per-candidate timeout).
    pub max_latency_ms: Option<u64>,
    /// When true and no complexity preference is given, classify the
    /// prompt; when false, requests without a preference default to
    /// [`Complexity::Moderate`].
    pub auto_detect_complexity: bool,
}
