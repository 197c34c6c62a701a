//! Shared error type for the context pipeline.

use thiserror::Error;

/// Errors raised by the compressor, cache, or batcher.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A batch's processor function failed; every item in the batch
    /// fails with this message.
    #[error("batch processing failed: {0}")]
    BatchFailed(String),

    /// A successful batch produced fewer results than items.
    #[error("no result returned")]
    NoResult,

    /// The batcher has been shut down and no longer accepts work.
    #[error("batcher is shut down")]
    ShutDown,

    /// Canonical JSON serialization of a request failed.
    #[error("failed to canonicalize request: {0}")]
    Canonicalize(String),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
