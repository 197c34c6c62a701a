//! GC Scheduler (C14): a periodic sweep over every component that
//! accumulates expired state, plus an emergency path triggered by a
//! critical memory alert.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sentry_audit::{AuditLog, EventType as AuditEventType, Severity};
use sentry_core::Timestamp;
use sentry_events::EventBus;
use tokio_util::sync::CancellationToken;

use crate::error::GcError;
use crate::types::{GcRunRecord, GcTrigger};

/// Default interval between scheduled GC passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// How many completed runs [`GcScheduler::history`] retains.
pub const HISTORY_CAPACITY: usize = 100;
/// Rough byte cost attributed to each removed entry, used only to turn
/// a removal count into the `memory_freed` estimate in a report.
const ESTIMATED_BYTES_PER_ENTRY: u64 = 512;

/// A single component this scheduler can ask to clean up its own
/// expired state. One concrete implementation wraps a session store,
/// a prompt cache, an approval queue, or an undo-ticket table; this
/// crate only defines the seam.
#[async_trait]
pub trait GcTarget: Send + Sync {
    /// A short label used in logs and audit metadata.
    fn label(&self) -> &'static str;

    /// Remove this target's own expired entries and report how many
    /// were removed.
    async fn sweep(&self) -> Result<usize, String>;
}

/// The collaborators a pass sweeps, grouped the way [`GcRunRecord`]
/// reports them.
#[derive(Default)]
pub struct GcTargets {
    /// Session-store targets (expired/revoked tokens).
    pub sessions: Vec<Arc<dyn GcTarget>>,
    /// Cache targets (prompt cache, deduplicator).
    pub cache_entries: Vec<Arc<dyn GcTarget>>,
    /// Approval-lifecycle targets (pending approvals past TTL, stale
    /// audit-trail rows, undo tickets past deadline).
    pub approvals: Vec<Arc<dyn GcTarget>>,
}

/// Runs a GC pass across registered targets and keeps a bounded
/// history of completed passes.
pub struct GcScheduler {
    targets: GcTargets,
    audit_log: Arc<AuditLog>,
    events: Arc<EventBus>,
    history: Mutex<VecDeque<GcRunRecord>>,
}

impl GcScheduler {
    /// Build a scheduler over `targets`.
    #[must_use]
    pub fn new(targets: GcTargets, audit_log: Arc<AuditLog>, events: Arc<EventBus>) -> Self {
        Self { targets, audit_log, events, history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)) }
    }

    fn history_lock(&self) -> std::sync::MutexGuard<'_, VecDeque<GcRunRecord>> {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn sweep_category(&self, targets: &[Arc<dyn GcTarget>]) -> usize {
        let mut removed = 0;
        for target in targets {
            match target.sweep().await {
                Ok(count) => removed += count,
                Err(error) => {
                    let error = GcError::TargetFailed(target.label(), error);
                    tracing::warn!(%error, "gc target sweep failed");
                },
            }
        }
        removed
    }

    /// Run one GC pass over every registered target, record the
    /// result, and audit it.
    pub async fn run_once(&self, trigger: GcTrigger) -> GcRunRecord {
        let started = Instant::now();
        let sessions = self.sweep_category(&self.targets.sessions).await;
        let cache_entries = self.sweep_category(&self.targets.cache_entries).await;
        let approvals = self.sweep_category(&self.targets.approvals).await;

        let record = GcRunRecord {
            sessions,
            cache_entries,
            approvals,
            memory_freed: (sessions + cache_entries + approvals) as u64 * ESTIMATED_BYTES_PER_ENTRY,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp: Timestamp::now(),
        };

        {
            let mut history = self.history_lock();
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(record);
        }

        if let Err(error) = self
            .audit_log
            .record_with_metadata(
                AuditEventType::GcRun,
                Severity::Info,
                format!("gc pass removed {} entries ({trigger:?})", record.total_removed()),
                None,
                serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
            )
            .await
        {
            tracing::warn!(%error, "failed to audit gc pass");
        }
        self.events.publish("gc.run", serde_json::to_value(record).unwrap_or(serde_json::Value::Null));

        record
    }

    /// Run an immediate pass in response to a critical memory alert.
    pub async fn run_emergency(&self) -> GcRunRecord {
        self.run_once(GcTrigger::Emergency).await
    }

    /// The last [`HISTORY_CAPACITY`] completed passes, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<GcRunRecord> {
        self.history_lock().iter().copied().collect()
    }

    /// The most recent completed pass, if any have run.
    #[must_use]
    pub fn last_run(&self) -> Option<GcRunRecord> {
        self.history_lock().back().copied()
    }
}

/// Spawn the periodic GC pass. The returned [`CancellationToken`] stops
/// the loop before its next tick.
#[must_use]
pub fn spawn_sweeper(scheduler: Arc<GcScheduler>, interval: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let record = scheduler.run_once(GcTrigger::Scheduled).await;
                    tracing::debug!(removed = record.total_removed(), "gc sweep completed");
                },
            }
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sentry_audit::AuditLog;

    use super::*;

    struct StubTarget {
        label: &'static str,
        remaining: AtomicUsize,
        fails: bool,
    }

    #[async_trait]
    impl GcTarget for StubTarget {
        fn label(&self) -> &'static str {
            self.label
        }

        async fn sweep(&self) -> Result<usize, String> {
            if self.fails {
                return Err("boom".to_string());
            }
            Ok(self.remaining.swap(0, Ordering::SeqCst))
        }
    }

    fn scheduler(targets: GcTargets) -> GcScheduler {
        GcScheduler::new(targets, Arc::new(AuditLog::in_memory()), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn run_once_sums_removed_counts_per_category() {
        let targets = GcTargets {
            sessions: vec![Arc::new(StubTarget { label: "sessions", remaining: AtomicUsize::new(3), fails: false })],
            cache_entries: vec![Arc::new(StubTarget { label: "cache", remaining: AtomicUsize::new(5), fails: false })],
            approvals: vec![Arc::new(StubTarget { label: "approvals", remaining: AtomicUsize::new(2), fails: false })],
        };
        let scheduler = scheduler(targets);
        let record = scheduler.run_once(GcTrigger::Scheduled).await;
        assert_eq!(record.sessions, 3);
        assert_eq!(record.cache_entries, 5);
        assert_eq!(record.approvals, 2);
        assert_eq!(record.total_removed(), 10);
        assert!(record.memory_freed > 0);
    }

    #[tokio::test]
    async fn failing_target_does_not_abort_the_pass() {
        let targets = GcTargets {
            sessions: vec![Arc::new(StubTarget { label: "sessions", remaining: AtomicUsize::new(1), fails: true })],
            cache_entries: vec![Arc::new(StubTarget { label: "cache", remaining: AtomicUsize::new(4), fails: false })],
            approvals: Vec::new(),
        };
        let scheduler = scheduler(targets);
        let record = scheduler.run_once(GcTrigger::Scheduled).await;
        assert_eq!(record.sessions, 0);
        assert_eq!(record.cache_entries, 4);
    }

    #[tokio::test]
    async fn history_is_capped_at_capacity() {
        let scheduler = scheduler(GcTargets::default());
        for _ in 0..HISTORY_CAPACITY + 10 {
            scheduler.run_once(GcTrigger::Scheduled).await;
        }
        assert_eq!(scheduler.history().len(), HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn emergency_run_is_recorded_with_emergency_trigger() {
        let scheduler = scheduler(GcTargets::default());
        let record = scheduler.run_emergency().await;
        assert_eq!(record.total_removed(), 0);
        assert_eq!(scheduler.last_run(), Some(record));
    }
}
