//! Audit entry types and the closed event taxonomy.
//!
//! Every security-relevant event is recorded under one of a fixed set of
//! `category:subtype` event types. Entries are chain-linked (each holds
//! the content hash of the entry before it) and signed by the gateway's
//! runtime identity, so a tampered or reordered log is detectable even
//! though the store behind it is a plain in-memory map.

use sentry_core::{AuditEntryId, OwnerId, Timestamp};
use sentry_crypto::{ContentHash, KeyPair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuditError, AuditResult};

/// The closed taxonomy of auditable event types. Every entry's `type`
/// field is one of these; there is no open-ended string variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// `auth:login`
    #[serde(rename = "auth:login")]
    AuthLogin,
    /// `auth:logout`
    #[serde(rename = "auth:logout")]
    AuthLogout,
    /// `auth:mfa_verify`
    #[serde(rename = "auth:mfa_verify")]
    AuthMfaVerify,
    /// `auth:failed_login`
    #[serde(rename = "auth:failed_login")]
    AuthFailedLogin,

    /// `approval:created`
    #[serde(rename = "approval:created")]
    ApprovalCreated,
    /// `approval:approved`
    #[serde(rename = "approval:approved")]
    ApprovalApproved,
    /// `approval:denied`
    #[serde(rename = "approval:denied")]
    ApprovalDenied,
    /// `approval:expired`
    #[serde(rename = "approval:expired")]
    ApprovalExpired,
    /// `approval:auto_approved`
    #[serde(rename = "approval:auto_approved")]
    ApprovalAutoApproved,

    /// `credential:created`
    #[serde(rename = "credential:created")]
    CredentialCreated,
    /// `credential:accessed`
    #[serde(rename = "credential:accessed")]
    CredentialAccessed,
    /// `credential:rotated`
    #[serde(rename = "credential:rotated")]
    CredentialRotated,
    /// `credential:deleted`
    #[serde(rename = "credential:deleted")]
    CredentialDeleted,

    /// `sandbox:execution`
    #[serde(rename = "sandbox:execution")]
    SandboxExecution,
    /// `sandbox:blocked`
    #[serde(rename = "sandbox:blocked")]
    SandboxBlocked,

    /// `security:injection_blocked`
    #[serde(rename = "security:injection_blocked")]
    SecurityInjectionBlocked,
    /// `security:exfiltration_blocked`
    #[serde(rename = "security:exfiltration_blocked")]
    SecurityExfiltrationBlocked,
    /// `security:alert`
    #[serde(rename = "security:alert")]
    SecurityAlert,

    /// `network:request_blocked`
    #[serde(rename = "network:request_blocked")]
    NetworkRequestBlocked,

    /// `session:created`
    #[serde(rename = "session:created")]
    SessionCreated,
    /// `session:invalidated`
    #[serde(rename = "session:invalidated")]
    SessionInvalidated,

    /// `config:changed`
    #[serde(rename = "config:changed")]
    ConfigChanged,

    /// `trust:stale_data`
    #[serde(rename = "trust:stale_data")]
    TrustStaleData,
    /// `trust:silent_failure`
    #[serde(rename = "trust:silent_failure")]
    TrustSilentFailure,
    /// `trust:behavior_change`
    #[serde(rename = "trust:behavior_change")]
    TrustBehaviorChange,
    /// `trust:user_report`
    #[serde(rename = "trust:user_report")]
    TrustUserReport,
    /// `trust:memory_attribution`
    #[serde(rename = "trust:memory_attribution")]
    TrustMemoryAttribution,
    /// `trust:cascade_failure`
    #[serde(rename = "trust:cascade_failure")]
    TrustCascadeFailure,
    /// `trust:signal_stop`
    #[serde(rename = "trust:signal_stop")]
    TrustSignalStop,

    /// `rollout:freeze`
    #[serde(rename = "rollout:freeze")]
    RolloutFreeze,
    /// `rollout:unfreeze`
    #[serde(rename = "rollout:unfreeze")]
    RolloutUnfreeze,
    /// `rollout:phase_change`
    #[serde(rename = "rollout:phase_change")]
    RolloutPhaseChange,
    /// `rollout:briefings_disabled`
    #[serde(rename = "rollout:briefings_disabled")]
    RolloutBriefingsDisabled,
    /// `rollout:briefings_enabled`
    #[serde(rename = "rollout:briefings_enabled")]
    RolloutBriefingsEnabled,
    /// `rollout:eligibility_assessed`
    #[serde(rename = "rollout:eligibility_assessed")]
    RolloutEligibilityAssessed,
    /// `rollout:clean_day`
    #[serde(rename = "rollout:clean_day")]
    RolloutCleanDay,
    /// `rollout:clean_days_reset`
    #[serde(rename = "rollout:clean_days_reset")]
    RolloutCleanDaysReset,

    /// `gc:run`
    #[serde(rename = "gc:run")]
    GcRun,
}

impl EventType {
    /// The `category:subtype` string for this event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthLogin => "auth:login",
            Self::AuthLogout => "auth:logout",
            Self::AuthMfaVerify => "auth:mfa_verify",
            Self::AuthFailedLogin => "auth:failed_login",
            Self::ApprovalCreated => "approval:created",
            Self::ApprovalApproved => "approval:approved",
            Self::ApprovalDenied => "approval:denied",
            Self::ApprovalExpired => "approval:expired",
            Self::ApprovalAutoApproved => "approval:auto_approved",
            Self::CredentialCreated => "credential:created",
            Self::CredentialAccessed => "credential:accessed",
            Self::CredentialRotated => "credential:rotated",
            Self::CredentialDeleted => "credential:deleted",
            Self::SandboxExecution => "sandbox:execution",
            Self::SandboxBlocked => "sandbox:blocked",
            Self::SecurityInjectionBlocked => "security:injection_blocked",
            Self::SecurityExfiltrationBlocked => "security:exfiltration_blocked",
            Self::SecurityAlert => "security:alert",
            Self::NetworkRequestBlocked => "network:request_blocked",
            Self::SessionCreated => "session:created",
            Self::SessionInvalidated => "session:invalidated",
            Self::ConfigChanged => "config:changed",
            Self::TrustStaleData => "trust:stale_data",
            Self::TrustSilentFailure => "trust:silent_failure",
            Self::TrustBehaviorChange => "trust:behavior_change",
            Self::TrustUserReport => "trust:user_report",
            Self::TrustMemoryAttribution => "trust:memory_attribution",
            Self::TrustCascadeFailure => "trust:cascade_failure",
            Self::TrustSignalStop => "trust:signal_stop",
            Self::RolloutFreeze => "rollout:freeze",
            Self::RolloutUnfreeze => "rollout:unfreeze",
            Self::RolloutPhaseChange => "rollout:phase_change",
            Self::RolloutBriefingsDisabled => "rollout:briefings_disabled",
            Self::RolloutBriefingsEnabled => "rollout:briefings_enabled",
            Self::RolloutEligibilityAssessed => "rollout:eligibility_assessed",
            Self::RolloutCleanDay => "rollout:clean_day",
            Self::RolloutCleanDaysReset => "rollout:clean_days_reset",
            Self::GcRun => "gc:run",
        }
    }

    /// The category prefix, e.g. `"trust"` for [`Self::TrustSignalStop`].
    #[must_use]
    pub fn category(self) -> &'static str {
        self.as_str().split(':').next().unwrap_or("")
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine, expected event.
    Info,
    /// Notable but not actionable on its own.
    Warning,
    /// An operation failed or was blocked.
    Error,
    /// Requires operator attention (e.g. a trust halt).
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single, signed, chain-linked audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// Closed-taxonomy event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Severity of the event.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Owner the event pertains to, if any.
    pub owner: Option<OwnerId>,
    /// Originating IP address, if known.
    pub ip: Option<String>,
    /// Arbitrary structured context.
    pub metadata: Option<Value>,
    /// When the event occurred.
    pub at: Timestamp,
    /// Content hash of the previous entry in the chain.
    pub previous_hash: ContentHash,
    /// Runtime public key that signed this entry.
    pub signer: PublicKey,
    /// Signature over the entry's signing data.
    pub signature: Signature,
}

/// Fields supplied by a caller to append a new entry; chain linkage and
/// signing are filled in by the log itself.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Closed-taxonomy event type.
    pub event_type: EventType,
    /// Severity of the event.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Owner the event pertains to, if any.
    pub owner: Option<OwnerId>,
    /// Originating IP address, if known.
    pub ip: Option<String>,
    /// Arbitrary structured context.
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub(crate) fn sign(
        new: NewAuditEntry,
        previous_hash: ContentHash,
        runtime_key: &KeyPair,
    ) -> Self {
        let mut entry = Self {
            id: AuditEntryId::new(),
            event_type: new.event_type,
            severity: new.severity,
            message: new.message,
            owner: new.owner,
            ip: new.ip,
            metadata: new.metadata,
            at: Timestamp::now(),
            previous_hash,
            signer: runtime_key.export_public_key(),
            signature: Signature::from_bytes([0u8; 64]),
        };
        let signing_data = entry.signing_data();
        entry.signature = runtime_key.sign(&signing_data);
        entry
    }

    /// The bytes signed by [`Self::signature`].
    #[must_use]
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(self.id.to_string().as_bytes());
        data.extend_from_slice(self.event_type.as_str().as_bytes());
        data.extend_from_slice(self.severity.to_string().as_bytes());
        data.extend_from_slice(self.message.as_bytes());
        if let Some(owner) = &self.owner {
            data.extend_from_slice(owner.to_string().as_bytes());
        }
        if let Some(ip) = &self.ip {
            data.extend_from_slice(ip.as_bytes());
        }
        if let Some(metadata) = &self.metadata {
            if let Ok(bytes) = serde_json::to_vec(metadata) {
                data.extend_from_slice(&bytes);
            }
        }
        data.extend_from_slice(&self.at.unix_timestamp().to_le_bytes());
        data.extend_from_slice(self.previous_hash.as_bytes());
        data.extend_from_slice(self.signer.as_bytes());
        data
    }

    /// Content hash of this entry, used as the next entry's
    /// `previous_hash`.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::hash(&self.signing_data())
    }

    /// Verify this entry's signature against its own signer key.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSignature`] if the signature does not
    /// match the entry contents.
    pub fn verify_signature(&self) -> AuditResult<()> {
        let signing_data = self.signing_data();
        self.signer.verify(&signing_data, &self.signature).map_err(|_| {
            AuditError::InvalidSignature { entry_id: self.id.to_string() }
        })
    }

    /// Whether this entry directly follows `previous` in the chain.
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.previous_hash == previous.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> KeyPair {
        KeyPair::generate()
    }

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

    #[test]
    fn event_type_round_trips_through_json() {
        let json = serde_json::to_string(&EventType::TrustSignalStop).unwrap();
        assert_eq!(json, "\"trust:signal_stop\"");
        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventType::TrustSignalStop);
    }

    #[test]
    fn category_extracts_prefix() {
        assert_eq!(EventType::RolloutFreeze.category(), "rollout");
    }

    #[test]
    fn entry_signature_verifies() {
        let kp = keypair();
        let entry = AuditEntry::sign(new_entry(EventType::SessionCreated), ContentHash::zero(), &kp);
        assert!(entry.verify_signature().is_ok());
    }

    #[test]
    fn chain_linking_detects_order() {
        let kp = keypair();
        let first = AuditEntry::sign(new_entry(EventType::SessionCreated), ContentHash::zero(), &kp);
        let second =
            AuditEntry::sign(new_entry(EventType::SessionInvalidated), first.content_hash(), &kp);
        assert!(second.follows(&first));
        assert!(!first.follows(&second));
    }

    #[test]
    fn tampering_breaks_signature() {
        let kp = keypair();
        let mut entry =
            AuditEntry::sign(new_entry(EventType::CredentialAccessed), ContentHash::zero(), &kp);
        entry.message = "tampered".into();
        assert!(entry.verify_signature().is_err());
    }
}
