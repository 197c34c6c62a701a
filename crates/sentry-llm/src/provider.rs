//! The uniform contract every provider adapter implements, polymorphic
//! over cloud chat-completion endpoints, cloud endpoints with bespoke
//! shapes, and local inference servers (OpenAI-compatible or bespoke).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use sentry_core::estimate_tokens;

use crate::error::LlmResult;
use crate::types::{
    CompletionRequest, DEFAULT_CHARS_PER_TOKEN, ModelConfig, ModelResponse, ProviderStatus,
    StreamChunk,
};

/// A boxed stream of completion chunks.
pub type StreamBox = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Uniform contract over heterogeneous LLM HTTP APIs.
///
/// `complete` and `complete_stream` never return `Err`: any failure
/// (network, auth, malformed response) is folded into a
/// [`ModelResponse`]/terminal [`StreamChunk`] whose `finish_reason` is
/// `Error`. `check_health` and `list_models` may fail and propagate,
/// since the Health Cache (C4) needs to distinguish "probe failed" from
/// "provider says it's down".
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name used in `provider:model` specs.
    fn name(&self) -> &str;

    /// Probe liveness. Implementations should prefer a cheap endpoint
    /// (e.g. listing models) over issuing a real completion.
    async fn check_health(&self) -> LlmResult<ProviderStatus>;

    /// Fetch this provider's current model catalog.
    async fn list_models(&self) -> LlmResult<Vec<ModelConfig>>;

    /// Run a completion to its end and return the full response.
    /// Infallible — see the trait doc comment.
    async fn complete(&self, req: &CompletionRequest, model: &str) -> ModelResponse;

    /// Run a completion and surface chunks as they arrive. Default
    /// implementation reports that this adapter has no streaming
    /// support; adapters that can stream override it.
    async fn complete_stream(&self, _req: &CompletionRequest, _model: &str) -> StreamBox {
        let provider = self.name().to_string();
        Box::pin(futures::stream::once(async move {
            StreamChunk::error(format!("{provider} does not support streaming"))
        }))
    }

    /// Estimate tokens in `text` using this provider's ratio, falling
    /// back to [`DEFAULT_CHARS_PER_TOKEN`] when the provider has no
    /// tokenizer of its own (used whenever the remote omits usage
    /// counts).
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text, DEFAULT_CHARS_PER_TOKEN)
    }
}

#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn check_health(&self) -> LlmResult<ProviderStatus> {
        (**self).check_health().await
    }

    async fn list_models(&self) -> LlmResult<Vec<ModelConfig>> {
        (**self).list_models().await
    }

    async fn complete(&self, req: &CompletionRequest, model: &str) -> ModelResponse {
        (**self).complete(req, model).await
    }

    async fn complete_stream(&self, req: &CompletionRequest, model: &str) -> StreamBox {
        (**self).complete_stream(req, model).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }
}
