//! Audit log storage trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use sentry_core::AuditEntryId;
use sentry_storage::{KvStore, MemoryKvStore, TypedRepository};
use tokio::sync::RwLock;

use crate::entry::{AuditEntry, EventType};
use crate::error::AuditResult;

const NS_ENTRIES: &str = "audit:entries";
const ORDER_KEY: &str = "order";

/// Storage backend for the audit log.
///
/// Implementations must be safe to share across tasks and must preserve
/// insertion order for [`AuditStorage::list_all`] — ordering is what
/// lets the chain be re-verified top to bottom.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Persist a new entry. Callers are responsible for chain-linking
    /// and signing before calling this.
    async fn store(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Fetch an entry by ID.
    async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>>;

    /// The most recently stored entry, if any (the current chain head).
    async fn head(&self) -> AuditResult<Option<AuditEntry>>;

    /// Every entry, in insertion order.
    async fn list_all(&self) -> AuditResult<Vec<AuditEntry>>;

    /// Entries whose event type falls within `category` (e.g. `"trust"`).
    async fn list_by_category(&self, category: &str) -> AuditResult<Vec<AuditEntry>>;

    /// Entries with `at` in `[start, end]`.
    async fn list_in_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> AuditResult<Vec<AuditEntry>>;

    /// Total entry count.
    async fn count(&self) -> AuditResult<usize>;
}

/// In-memory audit storage backed by [`MemoryKvStore`], plus an
/// insertion-order index kept under a single key.
pub struct InMemoryAuditStore {
    entries: TypedRepository<AuditEntry>,
    order: Arc<RwLock<Vec<AuditEntryId>>>,
}

impl InMemoryAuditStore {
    /// Create an empty audit store.
    #[must_use]
    pub fn new() -> Self {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        Self { entries: TypedRepository::new(store, NS_ENTRIES), order: Arc::new(RwLock::new(Vec::new())) }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditStorage for InMemoryAuditStore {
    async fn store(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries.put(&entry.id.to_string(), entry).await?;
        self.order.write().await.push(entry.id.clone());
        Ok(())
    }

    async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        Ok(self.entries.get(&id.to_string()).await?)
    }

    async fn head(&self) -> AuditResult<Option<AuditEntry>> {
        let order = self.order.read().await;
        match order.last() {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> AuditResult<Vec<AuditEntry>> {
        let order = self.order.read().await;
        let mut out = Vec::with_capacity(order.len());
        for id in order.iter() {
            if let Some(entry) = self.get(id).await? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    async fn list_by_category(&self, category: &str) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.event_type.category() == category)
            .collect())
    }

    async fn list_in_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.at.0 >= start && e.at.0 <= end)
            .collect())
    }

    async fn count(&self) -> AuditResult<usize> {
        Ok(self.order.read().await.len())
    }
}

/// Whether an [`EventType`] is one the spec requires to be persisted
/// before its triggering mutation is acknowledged (approval transitions,
/// trust halts).
#[must_use]
pub fn requires_synchronous_persistence(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::ApprovalCreated
            | EventType::ApprovalApproved
            | EventType::ApprovalDenied
            | EventType::ApprovalExpired
            | EventType::ApprovalAutoApproved
            | EventType::TrustSignalStop
    )
}

#[cfg(test)]
mod tests {
    use sentry_crypto::{ContentHash, KeyPair};

    use super::*;
    use crate::entry::{AuditEntry as Entry, NewAuditEntry, Severity};

    fn new_entry(event_type: EventType) -> NewAuditEntry {
        NewAuditEntry {
            event_type,
            severity: Severity::Info,
            message: "test".into(),
            owner: None,
            ip: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn store_and_get_round_trips() {
        let store = InMemoryAuditStore::new();
        let kp = KeyPair::generate();
        let entry = Entry::sign(new_entry(EventType::SessionCreated), ContentHash::zero(), &kp);
        let id = entry.id.clone();
        store.store(&entry).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn head_tracks_latest() {
        let store = InMemoryAuditStore::new();
        let kp = KeyPair::generate();
        let first = Entry::sign(new_entry(EventType::SessionCreated), ContentHash::zero(), &kp);
        store.store(&first).await.unwrap();
        let second =
            Entry::sign(new_entry(EventType::SessionInvalidated), first.content_hash(), &kp);
        store.store(&second).await.unwrap();
        assert_eq!(store.head().await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn list_by_category_filters() {
        let store = InMemoryAuditStore::new();
        let kp = KeyPair::generate();
        let a = Entry::sign(new_entry(EventType::TrustSignalStop), ContentHash::zero(), &kp);
        let b = Entry::sign(new_entry(EventType::SessionCreated), a.content_hash(), &kp);
        store.store(&a).await.unwrap();
        store.store(&b).await.unwrap();
        let trust = store.list_by_category("trust").await.unwrap();
        assert_eq!(trust.len(), 1);
        assert_eq!(trust[0].id, a.id);
    }

    #[test]
    fn approval_and_trust_halt_require_sync_persistence() {
        assert!(requires_synchronous_persistence(EventType::ApprovalApproved));
        assert!(requires_synchronous_persistence(EventType::TrustSignalStop));
        assert!(!requires_synchronous_persistence(EventType::SessionCreated));
    }
}
