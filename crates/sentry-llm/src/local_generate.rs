//! Adapter for local inference servers with a bespoke generate
//! endpoint (not OpenAI-compatible): a single JSON request, and for
//! streaming, line-delimited JSON objects rather than SSE frames.

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

/// Provider over a bespoke `{prompt, stream} -> {response, done}` style
/// local generate endpoint, in the shape local runtimes such as Ollama
/// expose on their native (non-OpenAI-compatible) route.
pub struct LocalGenerateProvider {
    client: Client,
    provider_name: String,
    generate_url: String,
    health_url: String,
    catalog: Vec<ModelConfig>,
}

impl LocalGenerateProvider {
    /// Build a provider against a bespoke local generate endpoint.
    #[must_use]
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        catalog: Vec<ModelConfig>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            provider_name: provider_name.into(),
            generate_url: format!("{base_url}/api/generate"),
            health_url: format!("{base_url}/api/tags"),
            catalog,
        }
    }

    fn prompt_text(&self, req: &CompletionRequest) -> String {
        let mut out = String::new();
        if let Some(system) = &req.system {
            out.push_str(system);
            out.push_str("\n\n");
        }
        for turn in &req.turns {
            out.push_str(role_label(turn.role));
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }

    fn build_request(&self, req: &CompletionRequest, model: &str, stream: bool) -> Value {
        serde_json::json!({
            "model": model,
            "prompt": self.prompt_text(req),
            "stream": stream,
            "options": {
                "temperature": req.temperature,
                "num_predict": req.max_tokens,
            },
        })
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[async_trait]
impl LlmProvider for LocalGenerateProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn check_health(&self) -> Result<ProviderStatus, LlmError> {
        let start = Instant::now();
        let result = self
            .client
            .get(&self.health_url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;
        let checked_at = Timestamp::now();
        Ok(match result {
            Ok(resp) if resp.status().is_success() => ProviderStatus {
                provider: self.provider_name.clone(),
                available: true,
                latency_ms: Some(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)),
                checked_at,
                available_models: self.catalog.iter().map(|m| m.model_id.clone()).collect(),
                error: None,
            },
            Ok(resp) => ProviderStatus {
                provider: self.provider_name.clone(),
                available: false,
                latency_ms: None,
                checked_at,
                available_models: vec![],
                error: Some(format!("HTTP {}", resp.status())),
            },
            Err(err) => ProviderStatus {
                provider: self.provider_name.clone(),
                available: false,
                latency_ms: None,
                checked_at,
                available_models: vec![],
                error: Some(err.to_string()),
            },
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelConfig>, LlmError> {
        Ok(self.catalog.clone())
    }

    async fn complete(&self, req: &CompletionRequest, model: &str) -> ModelResponse {
        let body = self.build_request(req, model, false);
        debug!(provider = %self.provider_name, model, "sending bespoke completion request");

        let send = self
            .client
            .post(&self.generate_url)
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

        let text = match response.text().await {
            Ok(t) => t,
            Err(err) => return ModelResponse::error(model, err.to_string()),
        };

        // A non-streaming request may still come back as one JSON
        // object or, from servers that ignore `stream: false`, a
        // sequence of line-delimited objects; concatenate either way.
        let mut content = String::new();
        let mut prompt_eval = None;
        let mut eval = None;
        let mut saw_line = false;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(parsed) = serde_json::from_str::<GenerateLine>(line) else {
                continue;
            };
            saw_line = true;
            content.push_str(&parsed.response);
            prompt_eval = parsed.prompt_eval_count.or(prompt_eval);
            eval = parsed.eval_count.or(eval);
        }
        if !saw_line {
            return ModelResponse::error(model, "no parseable response lines");
        }

        let usage = Usage {
            input_tokens: prompt_eval
                .unwrap_or_else(|| self.count_tokens(&self.prompt_text(req))),
            output_tokens: eval.unwrap_or_else(|| estimate_tokens(&content, DEFAULT_CHARS_PER_TOKEN)),
        };

        ModelResponse { model: model.to_string(), content, finish_reason: FinishReason::Stop, usage, error: None }
    }

    async fn complete_stream(&self, req: &CompletionRequest, model: &str) -> StreamBox {
        let body = self.build_request(req, model, true);
        let request = self
            .client
            .post(&self.generate_url)
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
            let mut output_tokens = 0usize;
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

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(parsed) = serde_json::from_str::<GenerateLine>(&line) else {
                        // Malformed lines are skipped, not fatal.
                        continue;
                    };
                    if !parsed.response.is_empty() {
                        output_tokens += estimate_tokens(&parsed.response, DEFAULT_CHARS_PER_TOKEN);
                        yield StreamChunk::delta(parsed.response);
                    }
                    if parsed.done {
                        let usage = Usage {
                            input_tokens: parsed.prompt_eval_count.unwrap_or(0),
                            output_tokens: parsed.eval_count.unwrap_or(output_tokens),
                        };
                        yield StreamChunk::done(usage, FinishReason::Stop);
                        return;
                    }
                }
            }

            yield StreamChunk::done(Usage { input_tokens: 0, output_tokens }, FinishReason::Stop);
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalGenerateProvider {
        LocalGenerateProvider::new("ollama", "http://localhost:11434", vec![])
    }

    #[test]
    fn build_request_embeds_prompt_and_options() {
        let p = provider();
        let req = CompletionRequest::from_prompt("hello");
        let body = p.build_request(&req, "llama3", true);
        assert_eq!(body["model"], "llama3");
        assert!(body["prompt"].as_str().unwrap().contains("hello"));
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn prompt_text_includes_role_labels() {
        let p = provider();
        let req = CompletionRequest::from_prompt("hi there");
        let text = p.prompt_text(&req);
        assert!(text.contains("User: hi there"));
    }
}
