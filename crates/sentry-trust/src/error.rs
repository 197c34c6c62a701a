//! Error types for the Trust Monitor and Rollout Controller.

use thiserror::Error;

/// Errors from trust-signal recording and rollout-phase operations.
#[derive(Debug, Error)]
pub enum TrustError {
    /// A phase advance was requested but the clean-day streak is short.
    #[error("cannot advance: {consecutive_clean_days} consecutive clean days, {required} required")]
    InsufficientCleanDays {
        /// Days observed.
        consecutive_clean_days: u32,
        /// Days required by the target phase.
        required: u32,
    },

    /// A phase advance or unfreeze was requested while frozen.
    #[error("rollout is frozen: {0}")]
    Frozen(String),

    /// A phase advance was requested to a phase that is not the next one up.
    #[error("phase {current} cannot advance directly to {target}")]
    NonMonotonePhase {
        /// Current phase.
        current: u8,
        /// Requested phase.
        target: u8,
    },

    /// The rollout is already at the open phase; there is nothing to advance to.
    #[error("rollout is already fully open")]
    AlreadyOpen,
}

/// Result type for trust and rollout operations.
pub type TrustResult<T> = Result<T, TrustError>;
