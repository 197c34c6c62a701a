//! Approval Queue entities: requests, audit trail, and auto-approval rules.

use sentry_core::{ApprovalRequestId, OwnerId, RiskLevel, SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of action an approval request gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Writing to a file path.
    FileWrite,
    /// Deleting a file path.
    FileDelete,
    /// Outbound network request.
    NetworkCall,
    /// Using a stored credential.
    CredentialUse,
    /// Running a shell command.
    DangerousCommand,
    /// Calling an external (non-provider) API.
    ExternalApi,
    /// Changing system/process configuration.
    SystemConfig,
}

/// Lifecycle state of an approval request. Transitions only ever leave
/// `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// A human approved it.
    Approved,
    /// A human denied it.
    Denied,
    /// The TTL elapsed before any decision was made.
    Expired,
    /// An auto-approval rule matched at creation time.
    AutoApproved,
}

/// A pending (or resolved) decision record for a sensitive action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique id.
    pub id: ApprovalRequestId,
    /// The category of action being gated.
    pub category: Category,
    /// Short machine-oriented description of the operation (e.g. a
    /// glob-matchable command line or `"GET api.github.com/user"`).
    pub operation: String,
    /// The full payload of the action, if larger than `operation`.
    pub action_body: String,
    /// Risk level, assigned by the [`crate::risk::RiskScorer`] at creation.
    pub risk: RiskLevel,
    /// Human-readable rationale shown to the approver.
    pub context_text: String,
    /// Optional extra detail (stack traces, diffs, raw payloads).
    pub technical_details: Option<String>,
    /// The session that originated the request.
    pub session_id: SessionId,
    /// The owner the request belongs to, if known at creation.
    pub owner: Option<OwnerId>,
    /// When the request was created.
    pub created_at: Timestamp,
    /// When a still-pending request is swept to `expired`.
    pub expires_at: Timestamp,
    /// Current lifecycle state.
    pub status: ApprovalStatus,
    /// Id of the auto-approval rule that fired, if `status == AutoApproved`.
    pub matched_rule: Option<String>,
    /// Caller-supplied structured context.
    pub metadata: Option<Value>,
}

impl ApprovalRequest {
    /// Whether this request is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

/// A decided transition recorded for an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The request was created.
    Created,
    /// A human approved it.
    Approved,
    /// A human denied it.
    Denied,
    /// It was swept to `expired`.
    Expired,
    /// An auto-approval rule matched.
    AutoApproved,
}

/// An append-only record of one transition in an approval request's
/// lifecycle. Distinct from the gateway-wide [`sentry_audit::AuditEntry`]
/// chain (which also records `approval:*` events): this is the queue's
/// own indexed history, keyed by `request_id` for cheap per-request
/// lookups in [`crate::queue::ApprovalQueue::history`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAuditEntry {
    /// Unique id of this audit row.
    pub id: u64,
    /// The request this entry belongs to.
    pub request_id: ApprovalRequestId,
    /// What happened.
    pub action: AuditAction,
    /// When it happened.
    pub at: Timestamp,
    /// Who did it, if a human actor (absent for rule/sweep transitions).
    pub actor: Option<OwnerId>,
    /// Free-text detail, e.g. a denial reason or the matched rule id.
    pub details: Option<String>,
}

/// A pre-registered matcher letting a matching request transition
/// straight from `pending` to `auto_approved` at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoApprovalRule {
    /// Unique id.
    pub id: String,
    /// Category the rule applies to.
    pub category: Category,
    /// Glob pattern matched against `operation`.
    pub operation_glob: String,
    /// The rule covers requests whose risk is at or below this ceiling.
    pub risk_ceiling: RiskLevel,
    /// Restrict the rule to requests from this owner, if set.
    pub owner: Option<OwnerId>,
    /// The rule itself expires (stops matching) after this time.
    pub expires_at: Option<Timestamp>,
}

impl AutoApprovalRule {
    /// Whether `rule` still applies at `now` (hasn't itself expired).
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Filter applied to [`crate::queue::ApprovalQueue::history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only requests in this category.
    pub category: Option<Category>,
    /// Only requests in this status.
    pub status: Option<ApprovalStatus>,
    /// Only requests owned by this owner.
    pub owner: Option<OwnerId>,
    /// Maximum rows returned.
    pub limit: Option<usize>,
    /// Rows to skip before applying `limit`.
    pub offset: usize,
}
