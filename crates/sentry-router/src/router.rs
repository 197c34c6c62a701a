//! Model Router (C9): complexity-driven candidate selection with
//! health-aware fallback dispatch.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream};
use sentry_core::ModelSpec;
use sentry_llm::{CompletionRequest, HealthCache, LlmProvider, ModelResponse, StreamBox, StreamChunk, Usage};

use crate::classify::classify_complexity;
use crate::types::{Complexity, RoutingConfig};

const NO_CANDIDATE_ERROR: &str = "all models failed or unavailable";

/// Routes a request to the best available model for its complexity,
/// falling back through the configured chain when candidates are
/// unavailable or fail.
pub struct ModelRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    health: Arc<HealthCache>,
    config: RoutingConfig,
    default_provider: String,
}

impl ModelRouter {
    /// Build a router over a fixed provider registry and health cache.
    /// `default_provider` is used to resolve bare (providerless) model
    /// specs.
    #[must_use]
    pub fn new(
        providers: HashMap<String, Arc<dyn LlmProvider>>,
        health: Arc<HealthCache>,
        config: RoutingConfig,
        default_provider: impl Into<String>,
    ) -> Self {
        Self { providers, health, config, default_provider: default_provider.into() }
    }

    fn prompt_text(req: &CompletionRequest) -> String {
        let mut text = req.system.clone().unwrap_or_default();
        for turn in &req.turns {
            text.push(' ');
            text.push_str(&turn.content);
        }
        text
    }

    fn classify(&self, req: &CompletionRequest, preferred: Option<Complexity>) -> Complexity {
        if let Some(complexity) = preferred {
            return complexity;
        }
        if self.config.auto_detect_complexity {
            classify_complexity(&Self::prompt_text(req))
        } else {
            Complexity::Moderate
        }
    }

    /// Primary candidates for `complexity` followed by the fallback
    /// chain, deduplicated while preserving first-seen order.
    fn candidates(&self, complexity: Complexity) -> Vec<ModelSpec> {
        let primary = self.config.routing_rules.for_complexity(complexity);
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for spec in primary.iter().chain(self.config.fallback_chain.iter()) {
            if seen.insert(spec.to_string()) {
                ordered.push(spec.clone());
            }
        }
        ordered
    }

    /// Resolve the provider adapter and the model-available check for a
    /// candidate, or `None` if it can't currently serve.
    async fn resolve(&self, spec: &ModelSpec) -> Option<Arc<dyn LlmProvider>> {
        let provider_name = spec.provider_or(&self.default_provider);
        let provider = self.providers.get(provider_name)?;
        let status = self.health.status(provider_name).await?.ok()?;
        if !status.available || !status.available_models.iter().any(|m| m == &spec.model) {
            return None;
        }
        Some(Arc::clone(provider))
    }

    /// Classify (unless `preferred` is given), select candidates, and
    /// return the first non-error response. Never raises: if every
    /// candidate is unavailable or errors, returns a synthetic
    /// `model: "none"` error response.
    pub async fn route(&self, req: CompletionRequest, preferred: Option<Complexity>) -> ModelResponse {
        let complexity = self.classify(&req, preferred);
        for spec in self.candidates(complexity) {
            let Some(provider) = self.resolve(&spec).await else { continue };
            let response = provider.complete(&req, &spec.model).await;
            if !response.is_error() {
                return response;
            }
            tracing::debug!(model = %spec, error = ?response.error, "candidate failed, trying next");
        }
        ModelResponse::error("none", NO_CANDIDATE_ERROR)
    }

    /// Same candidate selection as [`Self::route`], but returns the
    /// first available candidate's stream unchanged rather than
    /// buffering a whole response.
    pub async fn route_stream(&self, req: CompletionRequest, preferred: Option<Complexity>) -> StreamBox {
        let complexity = self.classify(&req, preferred);
        for spec in self.candidates(complexity) {
            let Some(provider) = self.resolve(&spec).await else { continue };
            return provider.complete_stream(&req, &spec.model).await;
        }
        no_candidate_stream()
    }
}

fn no_candidate_stream() -> StreamBox {
    let chunk = StreamChunk::error(NO_CANDIDATE_ERROR);
    let boxed: Pin<Box<dyn Stream<Item = StreamChunk> + Send>> = Box::pin(stream::once(async move { chunk }));
    boxed
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sentry_core::Timestamp;
    use sentry_llm::{FinishReason, LlmError, ModelConfig, ProviderStatus};

    use super::*;
    use crate::types::RoutingRules;

    struct StubProvider {
        name: String,
        available: bool,
        models: Vec<String>,
        fails: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn check_health(&self) -> Result<ProviderStatus, LlmError> {
            Ok(ProviderStatus {
                provider: self.name.clone(),
                available: self.available,
                latency_ms: Some(1),
                checked_at: Timestamp::now(),
                available_models: self.models.clone(),
                error: None,
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelConfig>, LlmError> {
            Ok(vec![])
        }

        async fn complete(&self, _req: &CompletionRequest, model: &str) -> ModelResponse {
            if self.fails {
                return ModelResponse::error(model, "stub failure");
            }
            ModelResponse { model: model.to_string(), content: "ok".into(), finish_reason: FinishReason::Stop, usage: Usage::zero(), error: None }
        }
    }

    fn router_with(providers: Vec<StubProvider>, rules: RoutingRules, fallback: Vec<&str>) -> ModelRouter {
        let mut registry: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        for p in providers {
            registry.insert(p.name.clone(), Arc::new(p));
        }
        let health = Arc::new(HealthCache::new(registry.clone()));
        let config = RoutingConfig {
            routing_rules: rules,
            fallback_chain: fallback.into_iter().map(|s| s.parse().unwrap()).collect(),
            max_latency_ms: None,
            auto_detect_complexity: true,
        };
        ModelRouter::new(registry, health, config, "local")
    }

    fn req(text: &str) -> CompletionRequest {
        CompletionRequest::from_prompt(text)
    }

    #[tokio::test]
    async fn routes_to_first_available_candidate() {
        let rules = RoutingRules { simple: vec!["local:small".parse().unwrap()], moderate: vec![], complex: vec![] };
        let router = router_with(
            vec![StubProvider { name: "local".into(), available: true, models: vec!["small".into()], fails: false }],
            rules,
            vec![],
        );
        let response = router.route(req("what is rust"), None).await;
        assert_eq!(response.model, "small");
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn skips_unavailable_provider_and_falls_back() {
        let rules = RoutingRules { simple: vec!["down:a".parse().unwrap()], moderate: vec![], complex: vec![] };
        let router = router_with(
            vec![
                StubProvider { name: "down".into(), available: false, models: vec!["a".into()], fails: false },
                StubProvider { name: "local".into(), available: true, models: vec!["b".into()], fails: false },
            ],
            rules,
            vec!["local:b"],
        );
        let response = router.route(req("what is rust"), None).await;
        assert_eq!(response.model, "b");
    }

    #[tokio::test]
    async fn falls_back_after_candidate_errors() {
        let rules = RoutingRules { simple: vec!["flaky:a".parse().unwrap()], moderate: vec![], complex: vec![] };
        let router = router_with(
            vec![
                StubProvider { name: "flaky".into(), available: true, models: vec!["a".into()], fails: true },
                StubProvider { name: "local".into(), available: true, models: vec!["b".into()], fails: false },
            ],
            rules,
            vec!["local:b"],
        );
        let response = router.route(req("what is rust"), None).await;
        assert_eq!(response.model, "b");
    }

    #[tokio::test]
    async fn all_candidates_failing_returns_synthetic_error() {
        let rules = RoutingRules { simple: vec!["down:a".parse().unwrap()], moderate: vec![], complex: vec![] };
        let router = router_with(
            vec![StubProvider { name: "down".into(), available: false, models: vec!["a".into()], fails: false }],
            rules,
            vec![],
        );
        let response = router.route(req("what is rust"), None).await;
        assert_eq!(response.model, "none");
        assert!(response.is_error());
        assert_eq!(response.usage.total(), 0);
    }

    #[tokio::test]
    async fn explicit_preference_skips_classification() {
        let rules = RoutingRules {
            simple: vec!["local:small".parse().unwrap()],
            moderate: vec![],
            complex: vec!["local:big".parse().unwrap()],
        };
        let router = router_with(
            vec![StubProvider {
                name: "local".into(),
                available: true,
                models: vec!["small".into(), "big".into()],
                fails: false,
            }],
            rules,
            vec![],
        );
        let response = router.route(req("what is rust"), Some(Complexity::Complex)).await;
        assert_eq!(response.model, "big");
    }
}
