//! Simple prompt, healthy local provider serves it with zero usage
//! reported (a local adapter returns zeroed token counts until it
//! implements real accounting).

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::StubProvider;
use sentry_llm::{CompletionRequest, FinishReason, HealthCache, LlmProvider};
use sentry_router::{ModelRouter, RoutingConfig, RoutingRules};

#[tokio::test]
async fn simple_prompt_routes_to_the_first_healthy_local_candidate() {
    let ollama = StubProvider::new("ollama", true, &["llama3"], false);

    let mut registry: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    registry.insert("ollama".into(), Arc::clone(&ollama) as Arc<dyn LlmProvider>);

    let health = Arc::new(HealthCache::new(registry.clone()));
    let rules = RoutingRules { simple: vec!["ollama:llama3".parse().unwrap()], moderate: vec![], complex: vec![] };
    let config = RoutingConfig { routing_rules: rules, fallback_chain: vec![], max_latency_ms: None, auto_detect_complexity: true };
    let router = ModelRouter::new(registry, health, config, "ollama");

    let request = CompletionRequest::from_prompt("What time is it?");
    let response = router.route(request, None).await;

    assert!(!response.is_error());
    assert_eq!(response.model, "llama3");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.input_tokens, 0);
    assert_eq!(response.usage.output_tokens, 0);
    assert_eq!(ollama.call_count(), 1);
}
