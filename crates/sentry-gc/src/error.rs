//! Error types for the GC Scheduler.

use thiserror::Error;

/// Errors from a GC pass.
#[derive(Debug, Error)]
pub enum GcError {
    /// A target's sweep panicked or its task was cancelled.
    #[error("gc target {0} failed: {1}")]
    TargetFailed(&'static str, String),
}

/// Result alias for GC operations.
pub type GcResult<T> = Result<T, GcError>;
