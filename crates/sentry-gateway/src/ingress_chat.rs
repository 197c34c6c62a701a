//! Chat completion ingress: the full request path through the
//! Context Compressor (C5), Prompt Cache & Deduplicator (C6), Model
//! Router (C9), and Cost Tracker (C8).

use serde::Serialize;
use sentry_core::{ConversationTurn, ErrorKind, GatewayError, GatewayResult, OwnerId, SessionId};
use sentry_cost::CostEntry;
use sentry_llm::ModelResponse;
use sentry_pipeline::compress;
use sentry_router::{classify_complexity, Complexity};

use crate::config_bridge;
use crate::gateway::Gateway;

/// The slice of a completion request the cache key is computed over.
/// `sentry_llm::CompletionRequest` itself carries no `Serialize` impl
/// (it isn't wire-facing at that layer), so the ingress boundary keys
/// on this narrower, serializable view instead.
#[derive(Serialize)]
struct CacheableRequest<'a> {
    turns: &'a [ConversationTurn],
    temperature: f64,
    max_tokens: usize,
}

/// A chat completion request as it arrives at the ingress boundary,
/// before compression or caching.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation turns so far.
    pub turns: Vec<ConversationTurn>,
    /// Session the request arrived on.
    pub session_id: SessionId,
    /// Owning account, if known.
    pub owner: Option<OwnerId>,
    /// Explicit complexity override, bypassing auto-classification.
    pub complexity: Option<Complexity>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
}

impl Gateway {
    /// Run a chat completion request through compression, the prompt
    /// cache/deduplicator, the router, and cost accounting.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails validation (empty turn
    /// list).
    pub async fn complete_chat(&self, request: ChatRequest) -> GatewayResult<ModelResponse> {
        if request.turns.is_empty() {
            return Err(GatewayError::validation("empty_turns", "a chat request must include at least one turn"));
        }

        let compressor_config = config_bridge::compressor_config(&self.config);
        let compressed = compress(&request.turns, &compressor_config);

        let cacheable = CacheableRequest { turns: &compressed.turns, temperature: request.temperature, max_tokens: request.max_tokens };
        let cache_key = sentry_pipeline::compute_key(&cacheable, Some(&request.session_id.to_string()), None)
            .map_err(|e| GatewayError::new(ErrorKind::Validation, "cache_key_error", e.to_string()))?;

        let completion_request = sentry_llm::CompletionRequest {
            turns: compressed.turns,
            system: None,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        // The router only resolves a concrete model once it dials a
        // candidate, so the batcher groups by the classified complexity
        // bucket instead — the one grouping key available before that
        // point, and the one that decides which candidate list a
        // request travels through anyway.
        let complexity = request.complexity.unwrap_or_else(|| {
            let text: String = completion_request.turns.iter().map(|t| t.content.as_str()).collect::<Vec<_>>().join(" ");
            classify_complexity(&text)
        });
        let batch_key = format!("{complexity:?}");

        let ttl = config_bridge::dedup_ttl(&self.config);
        let batcher = std::sync::Arc::clone(&self.batcher);
        let req_for_router = completion_request.clone();
        let response =
            self.prompt_cache.dedupe(cache_key, Some(ttl), move || {
                let batcher = std::sync::Arc::clone(&batcher);
                let req = req_for_router.clone();
                async move {
                    let handle = batcher.add(batch_key, (req, Some(complexity)), 0).await;
                    match handle.await {
                        Ok(Ok(response)) => response,
                        _ => ModelResponse::error("none", "batch processing failed"),
                    }
                }
            }).await;

        let total_tokens = response.usage.input_tokens + response.usage.output_tokens;
        if !response.is_error() && total_tokens > 0 {
            // The router doesn't surface which provider served a candidate
            // separately from its model name, so the model name stands in
            // for both fields here.
            let cost_usd = 0.0;
            let entry = CostEntry::new(
                response.model.clone(),
                response.model.clone(),
                u64::try_from(response.usage.input_tokens).unwrap_or(u64::MAX),
                u64::try_from(response.usage.output_tokens).unwrap_or(u64::MAX),
                cost_usd,
            );
            let _notifications = self.cost.record(entry);
        }

        Ok(response)
    }
}
