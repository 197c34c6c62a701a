//! Types reported by a GC pass.

use sentry_core::Timestamp;
use serde::{Deserialize, Serialize};

/// One completed GC pass: counts per cleanup category, an estimate of
/// memory reclaimed, and how long the pass took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcRunRecord {
    /// Expired or revoked session records removed.
    pub sessions: usize,
    /// Expired prompt-cache and deduplicator entries removed.
    pub cache_entries: usize,
    /// Expired pending approvals, stale audit-trail rows, and undo
    /// tickets past their deadline, combined.
    pub approvals: usize,
    /// Rough estimate of bytes reclaimed, derived from the total entry
    /// count removed. Not a measurement of actual allocator activity.
    pub memory_freed: u64,
    /// Wall-clock duration of the pass.
    pub duration_ms: u64,
    /// When the pass ran.
    pub timestamp: Timestamp,
}

impl GcRunRecord {
    /// Total entries removed across every category.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.sessions + self.cache_entries + self.approvals
    }
}

/// Why a pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcTrigger {
    /// The periodic sweep interval elapsed.
    Scheduled,
    /// A critical memory-pressure alert requested an immediate pass.
    Emergency,
}
