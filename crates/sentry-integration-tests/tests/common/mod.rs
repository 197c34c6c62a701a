//! Shared fixtures for the end-to-end scenarios in spec.md's testable
//! properties section, exercising more than one real crate together
//! with no mocking beyond the collaborator seams each crate already
//! pushes to its caller (an `LlmProvider` adapter, a
//! `SandboxedExecutor`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sentry_core::Timestamp;
use sentry_llm::{CompletionRequest, FinishReason, LlmError, LlmProvider, ModelConfig, ModelResponse, ProviderStatus, Usage};

/// A provider whose liveness and per-call behavior are fixed at
/// construction, with a call counter so tests can assert which
/// provider actually served a request.
pub struct StubProvider {
    pub name: String,
    pub available: bool,
    pub models: Vec<String>,
    pub fails: bool,
    pub calls: AtomicUsize,
}

impl StubProvider {
    #[must_use]
    pub fn new(name: &str, available: bool, models: &[&str], fails: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available,
            models: models.iter().map(|m| (*m).to_string()).collect(),
            fails,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return ModelResponse::error(model, "stub failure");
        }
        ModelResponse { model: model.to_string(), content: "ok".into(), finish_reason: FinishReason::Stop, usage: Usage::zero(), error: None }
    }
}
