//! Concrete [`SandboxedExecutor`]: a cmd-allowlisted, timeout-bounded
//! subprocess runner. `sentry-approval` only defines the seam; this is
//! the one adapter the gateway wires in at startup, the same way
//! [`crate::gc_targets`] supplies concrete [`sentry_gc::GcTarget`]s.

use std::time::Duration;

use async_trait::async_trait;
use sentry_approval::{ApprovalRequest, ExecutionReceipt, SandboxedExecutor};
use tokio::process::Command;
use tokio::time::timeout;

/// Default wall-clock budget for one allowlisted command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs an approved `DangerousCommand` action's `action_body` as a shell
/// command, provided its leading token is on the configured allowlist.
/// Every other category's `action_body` is treated the same way: a
/// single command line to execute under the same allowlist and timeout.
///
/// There is no generic compensating action for an arbitrary shell
/// command, so `undo` always fails; executed actions of this kind are
/// not undoable (`compensation_fn_id` is always `None`).
pub struct AllowlistExecutor {
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl AllowlistExecutor {
    /// Build an executor that only runs commands whose first
    /// whitespace-delimited token appears in `allowed_commands`.
    #[must_use]
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands, timeout: DEFAULT_COMMAND_TIMEOUT }
    }

    /// Like [`Self::new`] but overrides the per-command timeout.
    #[must_use]
    pub fn with_timeout(allowed_commands: Vec<String>, timeout: Duration) -> Self {
        Self { allowed_commands, timeout }
    }

    fn leading_command(action_body: &str) -> Option<&str> {
        action_body.split_whitespace().next()
    }

    fn is_allowed(&self, action_body: &str) -> bool {
        Self::leading_command(action_body)
            .is_some_and(|cmd| self.allowed_commands.iter().any(|allowed| allowed == cmd))
    }
}

#[async_trait]
impl SandboxedExecutor for AllowlistExecutor {
    async fn execute(&self, request: &ApprovalRequest) -> Result<ExecutionReceipt, String> {
        if !self.is_allowed(&request.action_body) {
            return Err(format!(
                "command {:?} is not on the allowlist",
                Self::leading_command(&request.action_body).unwrap_or("")
            ));
        }

        let output = timeout(self.timeout, Command::new("sh").arg("-c").arg(&request.action_body).output())
            .await
            .map_err(|_| "command timed out".to_string())?
            .map_err(|e| format!("failed to spawn command: {e}"))?;

        if !output.status.success() {
            return Err(format!(
                "command exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        Ok(ExecutionReceipt { compensation_fn_id: None, output: Some(String::from_utf8_lossy(&output.stdout).into_owned()) })
    }

    async fn undo(&self, _compensation_fn_id: &str) -> Result<(), String> {
        Err("generic shell commands have no automatic compensation".to_string())
    }
}

#[cfg(test)]
mod tests {
    use sentry_core::{ApprovalRequestId, RiskLevel, SessionId, Timestamp};
    use sentry_approval::{ApprovalStatus, Category};

    use super::*;

    fn request(action_body: &str) -> ApprovalRequest {
        ApprovalRequest {
            id: ApprovalRequestId::new(),
            category: Category::DangerousCommand,
            operation: "test".to_string(),
            action_body: action_body.to_string(),
            risk: RiskLevel::High,
            context_text: "test".to_string(),
            technical_details: None,
            session_id: SessionId::new(),
            owner: None,
            created_at: Timestamp::now(),
            expires_at: Timestamp::now().plus_seconds(300),
            status: ApprovalStatus::Approved,
            matched_rule: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn rejects_commands_off_the_allowlist() {
        let executor = AllowlistExecutor::new(vec!["echo".to_string()]);
        let err = executor.execute(&request("rm -rf /")).await.unwrap_err();
        assert!(err.contains("not on the allowlist"));
    }

    #[tokio::test]
    async fn runs_allowlisted_commands() {
        let executor = AllowlistExecutor::new(vec!["echo".to_string()]);
        let receipt = executor.execute(&request("echo hello")).await.unwrap();
        assert_eq!(receipt.compensation_fn_id, None);
        assert_eq!(receipt.output.unwrap().trim(), "hello");
    }

    #[tokio::test]
    async fn undo_is_always_unsupported() {
        let executor = AllowlistExecutor::new(vec!["echo".to_string()]);
        assert!(executor.undo("anything").await.is_err());
    }
}
