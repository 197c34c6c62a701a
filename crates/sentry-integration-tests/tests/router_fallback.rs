//! Complex prompt, primary provider down, fallback candidate serves it.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::StubProvider;
use sentry_llm::{CompletionRequest, HealthCache, LlmProvider};
use sentry_router::{ModelRouter, RoutingConfig, RoutingRules};

#[tokio::test]
async fn complex_prompt_falls_back_past_an_unavailable_primary() {
    let openai = StubProvider::new("openai", false, &["gpt-4o"], false);
    let anthropic = StubProvider::new("anthropic", true, &["claude-3.5-sonnet", "claude-3-opus"], false);

    let mut registry: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    registry.insert("openai".into(), Arc::clone(&openai) as Arc<dyn LlmProvider>);
    registry.insert("anthropic".into(), Arc::clone(&anthropic) as Arc<dyn LlmProvider>);

    let health = Arc::new(HealthCache::new(registry.clone()));
    let rules = RoutingRules {
        simple: vec![],
        moderate: vec![],
        complex: vec!["anthropic:claude-3.5-sonnet".parse().unwrap(), "openai:gpt-4o".parse().unwrap(), "anthropic:claude-3-opus".parse().unwrap()],
    };
    let config = RoutingConfig { routing_rules: rules, fallback_chain: vec![], max_latency_ms: None, auto_detect_complexity: true };
    let router = ModelRouter::new(registry, health, config, "anthropic");

    let request = CompletionRequest::from_prompt("Design and architect a microservices system for 1M rps.");
    let response = router.route(request, None).await;

    assert!(!response.is_error());
    assert_eq!(response.model, "claude-3.5-sonnet");
    assert_eq!(anthropic.call_count(), 1);
    assert_eq!(openai.call_count(), 0, "openai is unavailable and must never be dialed");
}
