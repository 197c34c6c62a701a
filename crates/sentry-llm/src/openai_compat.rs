//! Adapter for cloud and local endpoints that speak the OpenAI chat
//! completions shape: hosted OpenAI-compatible APIs and local servers
//! such as LM Studio or vLLM that expose the same contract.

use std::time::{Duration, Instant};

use async_stream::stream;
use async_trait::async_trait;
use reqwest::Client;
use sentry_core::{Role, Timestamp, estimate_tokens};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::LlmError;
use crate::provider::{LlmProvider, StreamBox};
use crate::types::{
    COMPLETE_TIMEOUT_SECS, CompletionRequest, DEFAULT_CHARS_PER_TOKEN, FinishReason, HEALTH_TIMEOUT_SECS, ModelConfig,
    ModelResponse, ProviderStatus, STREAM_TIMEOUT_SECS, StreamChunk, Usage,
};

/// Provider over the OpenAI chat-completions wire format.
pub struct OpenAiCompatProvider {
    client: Client,
    provider_name: String,
    base_url: String,
    api_key: Option<String>,
    catalog: Vec<ModelConfig>,
}

impl OpenAiCompatProvider {
    /// Build a provider. `base_url` is the API root (e.g.
    /// `https://api.openai.com/v1` or `http://localhost:1234/v1`);
    /// `/chat/completions` and `/models` are appended per call.
    #[must_use]
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        catalog: Vec<ModelConfig>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider_name: provider_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            catalog,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn build_request(&self, req: &CompletionRequest, model: &str, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for turn in &req.turns {
            messages.push(serde_json::json!({
                "role": role_str(turn.role),
                "content": turn.content,
            }));
        }
        serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "stream": stream,
        })
    }

    fn estimate_request_tokens(&self, req: &CompletionRequest) -> usize {
        let mut total = req.system.as_deref().map_or(0, |s| self.count_tokens(s));
        for turn in &req.turns {
            total += self.count_tokens(&turn.content);
        }
        total
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelsEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelsEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCall,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn check_health(&self) -> Result<ProviderStatus, LlmError> {
        let start = Instant::now();
        let result = self
            .apply_auth(self.client.get(self.models_url()))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        let checked_at = Timestamp::now();
        match result {
            Ok(resp) if resp.status().is_success() => {
                let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let models = resp
                    .json::<ModelsResponse>()
                    .await
                    .map(|body| body.data.into_iter().map(|m| m.id).collect())
                    .unwrap_or_else(|_| {
                        self.catalog.iter().map(|m| m.model_id.clone()).collect()
                    });
                Ok(ProviderStatus {
                    provider: self.provider_name.clone(),
                    available: true,
                    latency_ms: Some(latency_ms),
                    checked_at,
                    available_models: models,
                    error: None,
                })
            }
            Ok(resp) => Ok(ProviderStatus {
                provider: self.provider_name.clone(),
                available: false,
                latency_ms: None,
                checked_at,
                available_models: vec![],
                error: Some(format!("HTTP {}", resp.status())),
            }),
            Err(err) => Ok(ProviderStatus {
                provider: self.provider_name.clone(),
                available: false,
                latency_ms: None,
                checked_at,
                available_models: vec![],
                error: Some(err.to_string()),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelConfig>, LlmError> {
        Ok(self.catalog.clone())
    }

    async fn complete(&self, req: &CompletionRequest, model: &str) -> ModelResponse {
        if self.api_key.is_none() && !is_local_url(&self.base_url) {
            return ModelResponse::error(
                model,
                LlmError::ApiKeyNotConfigured { provider: self.provider_name.clone() }.message(),
            );
        }

        let body = self.build_request(req, model, false);
        debug!(provider = %self.provider_name, model, "sending completion request");

        let send = self
            .apply_auth(self.client.post(self.completions_url()))
            .json(&body)
            .timeout(Duration::from_secs(COMPLETE_TIMEOUT_SECS))
            .send()
            .await;

        let response = match send {
            Ok(r) => r,
            Err(err) => {
                return ModelResponse::error(
                    model,
                    LlmError::RequestFailed {
                        provider: self.provider_name.clone(),
                        message: err.to_string(),
                    }
                    .message(),
                );
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return ModelResponse::error(model, format!("HTTP {status}: {text}"));
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(p) => p,
            Err(err) => {
                return ModelResponse::error(
                    model,
                    LlmError::InvalidResponse {
                        provider: self.provider_name.clone(),
                        message: err.to_string(),
                    }
                    .message(),
                );
            }
        };

        let Some(choice) = parsed.choices.into_iter().next() else {
            return ModelResponse::error(model, "no choices in response");
        };
        let content = choice.message.content.unwrap_or_default();
        let finish_reason = map_finish_reason(choice.finish_reason.as_deref());
        let usage = parsed.usage.map_or_else(
            || Usage {
                input_tokens: self.estimate_request_tokens(req),
                output_tokens: estimate_tokens(&content, DEFAULT_CHARS_PER_TOKEN),
            },
            |u| Usage { input_tokens: u.prompt_tokens, output_tokens: u.completion_tokens },
        );

        ModelResponse { model: model.to_string(), content, finish_reason, usage, error: None }
    }

    async fn complete_stream(&self, req: &CompletionRequest, model: &str) -> StreamBox {
        if self.api_key.is_none() && !is_local_url(&self.base_url) {
            let provider = self.provider_name.clone();
            return Box::pin(futures::stream::once(async move {
                StreamChunk::error(
                    LlmError::ApiKeyNotConfigured { provider }.message(),
                )
            }));
        }

        let body = self.build_request(req, model, true);
        let request = self
            .apply_auth(self.client.post(self.completions_url()))
            .json(&body)
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS));

        let s = stream! {
            use futures::StreamExt;

            let response = match request.send().await {
                Ok(r) => r,
                Err(err) => {
                    yield StreamChunk::error(err.to_string());
                    return;
                }
            };
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                yield StreamChunk::error(format!("HTTP {status}: {text}"));
                return;
            }

            let mut buffer = String::new();
            let mut output_chars = 0usize;
            let mut byte_stream = response.bytes_stream();

            while let Some(next) = byte_stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(err) => {
                        yield StreamChunk::error(err.to_string());
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(pos) = buffer.find("\n\n") {
                    let frame = buffer[..pos].to_string();
                    buffer.drain(..=pos + 1);

                    for line in frame.lines() {
                        let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                            continue;
                        };
                        let data = data.trim();
                        if data == "[DONE]" {
                            yield StreamChunk::done(Usage { input_tokens: 0, output_tokens: output_chars }, FinishReason::Stop);
                            return;
                        }
                        let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
                            continue;
                        };
                        if let Some(usage) = event.usage {
                            let final_usage = Usage {
                                input_tokens: usage.prompt_tokens,
                                output_tokens: usage.completion_tokens,
                            };
                            yield StreamChunk::done(final_usage, FinishReason::Stop);
                            return;
                        }
                        let Some(choice) = event.choices.into_iter().next() else {
                            continue;
                        };
                        if let Some(content) = choice.delta.content {
                            output_chars += content.chars().count();
                            yield StreamChunk::delta(content);
                        }
                        if choice.finish_reason.is_some() {
                            let usage = Usage {
                                input_tokens: 0,
                                output_tokens: (output_chars as f64 / DEFAULT_CHARS_PER_TOKEN).ceil() as usize,
                            };
                            yield StreamChunk::done(usage, map_finish_reason(choice.finish_reason.as_deref()));
                            return;
                        }
                    }
                }
            }

            let usage = Usage {
                input_tokens: 0,
                output_tokens: (output_chars as f64 / DEFAULT_CHARS_PER_TOKEN).ceil() as usize,
            };
            yield StreamChunk::done(usage, FinishReason::Stop);
        };

        Box::pin(s)
    }
}

fn is_local_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("localhost") || lower.contains("127.0.0.1") || lower.contains("[::1]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("local", "http://localhost:1234/v1", None, vec![])
    }

    #[test]
    fn build_request_includes_stream_flag() {
        let p = provider();
        let req = CompletionRequest::from_prompt("hi");
        let body = p.build_request(&req, "local-model", true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "local-model");
    }

    #[tokio::test]
    async fn missing_key_for_remote_host_is_rejected() {
        let p = OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", None, vec![]);
        let req = CompletionRequest::from_prompt("hi");
        let resp = p.complete(&req, "gpt-4").await;
        assert!(resp.is_error());
        assert_eq!(resp.usage.total(), 0);
    }

    #[test]
    fn finish_reason_maps_tool_calls() {
        assert_eq!(map_finish_reason(Some("tool_calls")), FinishReason::ToolCall);
        assert_eq!(map_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(map_finish_reason(None), FinishReason::Stop);
    }
}
