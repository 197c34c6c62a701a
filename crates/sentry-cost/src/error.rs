//! Error type for the cost tracker.

use thiserror::Error;

/// Errors the cost tracker can return.
#[derive(Debug, Error)]
pub enum CostError {
    /// The requested period has no configured limit to compute utilization against.
    #[error("no budget limit configured for period {0:?}")]
    NoLimitConfigured(crate::types::Period),
}

/// Convenience alias for cost tracker results.
pub type CostResult<T> = Result<T, CostError>;
