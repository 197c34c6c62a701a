//! Sentry Audit - the append-only, tamper-evident audit log (C16).
//!
//! Every security-relevant event is recorded through [`AuditLog::append`]
//! under one of the closed [`entry::EventType`] variants. Entries form a
//! hash chain signed with the gateway's runtime identity; a corrupted or
//! reordered log is detectable by re-walking the chain and re-verifying
//! each signature. The storage engine behind the chain is swappable
//! through the [`storage::AuditStorage`] trait; this crate ships only an
//! in-memory implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod entry;
pub mod error;
pub mod export;
pub mod storage;

use std::sync::Arc;

use sentry_core::OwnerId;
use sentry_crypto::{ContentHash, KeyPair};
use serde_json::Value;
use tokio::sync::Mutex;

pub use entry::{AuditEntry, EventType, NewAuditEntry, Severity};
pub use error::{AuditError, AuditResult};
pub use storage::{AuditStorage, InMemoryAuditStore};

/// The audit log service: signs and chain-links every appended entry,
/// serializing appends so the chain never forks under concurrent writers.
pub struct AuditLog {
    storage: Arc<dyn AuditStorage>,
    runtime_key: KeyPair,
    append_lock: Mutex<()>,
}

impl AuditLog {
    /// Build a log over `storage`, signing entries with `runtime_key`.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>, runtime_key: KeyPair) -> Self {
        Self { storage, runtime_key, append_lock: Mutex::new(()) }
    }

    /// Convenience constructor backed by [`InMemoryAuditStore`] with a
    /// freshly generated runtime identity.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAuditStore::new()), KeyPair::generate())
    }

    /// Append a new entry, chain-linked to the current head and signed
    /// with the runtime key. Appends are serialized so the chain head
    /// read-then-write is atomic with respect to other appends.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails to persist the
    /// entry.
    pub async fn append(&self, new_entry: NewAuditEntry) -> AuditResult<AuditEntry> {
        let _guard = self.append_lock.lock().await;
        let previous_hash =
            self.storage.head().await?.map_or_else(ContentHash::zero, |e| e.content_hash());
        let entry = AuditEntry::sign(new_entry, previous_hash, &self.runtime_key);
        self.storage.store(&entry).await?;
        tracing::debug!(entry_id = %entry.id, event_type = %entry.event_type, "audit entry recorded");
        Ok(entry)
    }

    /// Shorthand for [`Self::append`] that fills in the common fields.
    pub async fn record(
        &self,
        event_type: EventType,
        severity: Severity,
        message: impl Into<String>,
        owner: Option<OwnerId>,
    ) -> AuditResult<AuditEntry> {
        self.append(NewAuditEntry {
            event_type,
            severity,
            message: message.into(),
            owner,
            ip: None,
            metadata: None,
        })
        .await
    }

    /// Like [`Self::record`] but attaches structured metadata.
    pub async fn record_with_metadata(
        &self,
        event_type: EventType,
        severity: Severity,
        message: impl Into<String>,
        owner: Option<OwnerId>,
        metadata: Value,
    ) -> AuditResult<AuditEntry> {
        self.append(NewAuditEntry {
            event_type,
            severity,
            message: message.into(),
            owner,
            ip: None,
            metadata: Some(metadata),
        })
        .await
    }

    /// Walk the full chain from the first entry, verifying each entry's
    /// signature and that it correctly follows its predecessor.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSignature`] or
    /// [`AuditError::IntegrityViolation`] at the first broken link.
    pub async fn verify_chain(&self) -> AuditResult<()> {
        let entries = self.storage.list_all().await?;
        let mut previous: Option<&AuditEntry> = None;
        for entry in &entries {
            entry.verify_signature()?;
            if let Some(prev) = previous {
                if !entry.follows(prev) {
                    return Err(AuditError::IntegrityViolation {
                        entry_id: entry.id.to_string(),
                        reason: "previous_hash does not match predecessor's content hash".into(),
                    });
                }
            } else if entry.previous_hash != ContentHash::zero() {
                return Err(AuditError::IntegrityViolation {
                    entry_id: entry.id.to_string(),
                    reason: "first entry does not chain from the zero hash".into(),
                });
            }
            previous = Some(entry);
        }
        Ok(())
    }

    /// Access the underlying storage (for export or range queries).
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn AuditStorage> {
        &self.storage
    }

    /// Export the full log as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access or serialization fails.
    pub async fn export_json(&self) -> AuditResult<String> {
        export::to_json(&self.storage.list_all().await?)
    }

    /// Export the full log as CSV.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access or serialization fails.
    pub async fn export_csv(&self) -> AuditResult<String> {
        export::to_csv(&self.storage.list_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appended_entries_form_a_valid_chain() {
        let log = AuditLog::in_memory();
        log.record(EventType::SessionCreated, Severity::Info, "session started", None)
            .await
            .unwrap();
        log.record(EventType::ApprovalCreated, Severity::Info, "approval requested", None)
            .await
            .unwrap();
        log.record(EventType::TrustSignalStop, Severity::Critical, "halted", None).await.unwrap();
        assert!(log.verify_chain().await.is_ok());
        assert_eq!(log.storage().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn export_json_contains_every_entry() {
        let log = AuditLog::in_memory();
        log.record(EventType::ConfigChanged, Severity::Info, "reload", None).await.unwrap();
        let json = log.export_json().await.unwrap();
        assert!(json.contains("config:changed"));
    }
}
