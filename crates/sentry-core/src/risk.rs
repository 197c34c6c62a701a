//! Risk levels and permission grants shared by the approval and audit
//! subsystems.

use serde::{Deserialize, Serialize};

/// The severity of a sensitive action, as assigned by the Risk Scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine, reversible, no approval required.
    Low,
    /// Reversible but worth a record.
    Medium,
    /// Requires human approval by default.
    High,
    /// Requires human approval and is audited at `critical` severity.
    Critical,
}

impl RiskLevel {
    /// Whether this level requires human (or rule) approval before
    /// execution.
    #[must_use]
    pub fn requires_approval(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A capability granted over a resource, as carried by session tokens and
/// auto-approval rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// May read the resource.
    Read,
    /// May write/mutate the resource.
    Write,
    /// May decrypt/reveal the resource's plaintext (credentials only).
    Reveal,
    /// May administer process-wide state (rollout, freeze/unfreeze).
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_high_and_critical_require_approval() {
        assert!(!RiskLevel::Low.requires_approval());
        assert!(!RiskLevel::Medium.requires_approval());
        assert!(RiskLevel::High.requires_approval());
        assert!(RiskLevel::Critical.requires_approval());
    }

    #[test]
    fn ordering_is_severity_order() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }
}
