//! Sentry Pipeline - Context Compressor (C5), Prompt Cache &
//! Deduplicator (C6), and Request Batcher (C7): the stages a request
//! passes through between the Router and the Provider Adapter.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod batch;
pub mod cache;
pub mod compress;
pub mod error;

pub use batch::{BatcherConfig, Processor, RequestBatcher};
pub use cache::{CacheStats, CheckResult, PromptCache, compute_key, spawn_sweeper};
pub use compress::{CompressedContext, CompressorConfig, compress};
pub use error::{PipelineError, PipelineResult};
