//! Sentry LLM - Provider Adapter (C3) and Health Cache (C4).
//!
//! A uniform [`LlmProvider`] contract sits over two adapter families:
//! [`openai_compat::OpenAiCompatProvider`] for anything that speaks the
//! OpenAI chat-completions wire format (cloud or local), and
//! [`local_generate::LocalGenerateProvider`] for local runtimes with a
//! bespoke generate endpoint. [`health::HealthCache`] sits above the
//! registry, caching liveness and catalog snapshots.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod health;
pub mod local_generate;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use error::{LlmError, LlmResult};
pub use health::HealthCache;
pub use local_generate::LocalGenerateProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, StreamBox};
pub use types::{
    Capabilities, CompletionRequest, FinishReason, ModelConfig, ModelResponse, ProviderStatus,
    Quality, Speed, StreamChunk, Usage,
};
