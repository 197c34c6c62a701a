//! Risk Scorer: a deny-first pattern matcher that assigns a [`RiskLevel`]
//! to `(category, action_body)` pairs, orthogonal to the approval state
//! machine itself.

use std::collections::HashMap;
use std::sync::Mutex;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sentry_core::RiskLevel;

use crate::types::Category;

const DEFAULT_HIGH_RISK_PATHS: &[&str] = &[
    "/etc/**",
    "/boot/**",
    "/sys/**",
    "**/.ssh/**",
    "**/.aws/**",
    "**/.gnupg/**",
    "**/.env",
    "**/*.pem",
    "**/*credential*",
    "**/*secret*",
    "**/*password*",
];

const DEFAULT_EXFILTRATION_HOSTS: &[&str] =
    &["pastebin.com", "transfer.sh", "ngrok.io", "requestbin.com", "webhook.site"];

const DEFAULT_DANGEROUS_COMMAND_PATTERNS: &[&str] = &[
    "sudo", "rm -rf", "| sh", "| bash", "|sh", "|bash", "curl | sh", "wget | sh", "eval ", "exec ",
    "chmod 777", "mkfs", "dd if=",
];

/// How many times the same pattern may match before the assigned level
/// escalates one step (capped at [`RiskLevel::Critical`]).
const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;

/// Configuration for [`RiskScorer`].
#[derive(Debug, Clone)]
pub struct RiskScorerConfig {
    /// Glob patterns marking a filesystem path as high-risk.
    pub high_risk_paths: Vec<String>,
    /// Hostnames treated as known exfiltration sinks.
    pub exfiltration_hosts: Vec<String>,
    /// Substrings marking a shell command as dangerous.
    pub dangerous_command_patterns: Vec<String>,
    /// Repeat-match count before a pattern's level escalates one step.
    pub escalation_threshold: u32,
}

impl Default for RiskScorerConfig {
    fn default() -> Self {
        Self {
            high_risk_paths: DEFAULT_HIGH_RISK_PATHS.iter().map(|s| (*s).to_string()).collect(),
            exfiltration_hosts: DEFAULT_EXFILTRATION_HOSTS.iter().map(|s| (*s).to_string()).collect(),
            dangerous_command_patterns: DEFAULT_DANGEROUS_COMMAND_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }
}

/// Assigns a risk level to an action at creation time, consulted by
/// [`crate::queue::ApprovalQueue::create`].
///
/// Globs are compiled once at construction (the paths list rarely
/// changes at runtime); per-pattern occurrence counts are kept so a
/// pattern seen repeatedly escalates past its single-match level.
pub struct RiskScorer {
    high_risk_paths: GlobSet,
    exfiltration_hosts: Vec<String>,
    dangerous_command_patterns: Vec<String>,
    escalation_threshold: u32,
    occurrences: Mutex<HashMap<String, u32>>,
}

impl RiskScorer {
    /// Compile a scorer from `config`. Malformed glob patterns are
    /// dropped silently rather than failing the whole scorer.
    #[must_use]
    pub fn new(config: RiskScorerConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.high_risk_paths {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let high_risk_paths = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty globset"));
        Self {
            high_risk_paths,
            exfiltration_hosts: config.exfiltration_hosts,
            dangerous_command_patterns: config.dangerous_command_patterns,
            escalation_threshold: config.escalation_threshold,
            occurrences: Mutex::new(HashMap::new()),
        }
    }

    /// Score `(category, action_body)` returning the assigned level.
    pub fn score(&self, category: Category, action_body: &str) -> RiskLevel {
        let (mut level, matched_pattern) = self.base_score(category, action_body);
        if let Some(pattern) = matched_pattern {
            level = self.apply_escalation(category, pattern, level);
        }
        level
    }

    fn base_score(&self, category: Category, action_body: &str) -> (RiskLevel, Option<&'static str>) {
        match category {
            Category::FileWrite | Category::FileDelete => {
                if self.high_risk_paths.is_match(action_body) {
                    (RiskLevel::High, Some("high_risk_path"))
                } else {
                    (RiskLevel::Medium, None)
                }
            },
            Category::NetworkCall => {
                let lower = action_body.to_lowercase();
                if lower.contains('*') {
                    (RiskLevel::High, Some("wildcard_target"))
                } else if self.exfiltration_hosts.iter().any(|h| lower.contains(h.as_str())) {
                    (RiskLevel::High, Some("exfiltration_host"))
                } else {
                    (RiskLevel::Low, None)
                }
            },
            Category::DangerousCommand => {
                let lower = action_body.to_lowercase();
                if self.dangerous_command_patterns.iter().any(|p| lower.contains(p.as_str())) {
                    (RiskLevel::Critical, Some("dangerous_command_pattern"))
                } else {
                    (RiskLevel::Medium, None)
                }
            },
            Category::CredentialUse => (RiskLevel::Medium, None),
            Category::ExternalApi => (RiskLevel::Low, None),
            Category::SystemConfig => (RiskLevel::High, None),
        }
    }

    fn apply_escalation(&self, category: Category, pattern: &'static str, level: RiskLevel) -> RiskLevel {
        let key = format!("{category:?}:{pattern}");
        let mut occurrences = self.occurrences.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = occurrences.entry(key).or_insert(0);
        *count += 1;
        if *count >= self.escalation_threshold { escalate(level) } else { level }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskScorerConfig::default())
    }
}

fn escalate(level: RiskLevel) -> RiskLevel {
    match level {
        RiskLevel::Low => RiskLevel::Medium,
        RiskLevel::Medium => RiskLevel::High,
        RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_risk_path_escalates_file_write() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.score(Category::FileWrite, "/etc/passwd"), RiskLevel::High);
        assert_eq!(scorer.score(Category::FileWrite, "/home/user/notes.txt"), RiskLevel::Medium);
    }

    #[test]
    fn dangerous_command_substring_is_critical() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.score(Category::DangerousCommand, "sudo rm -rf /tmp/x"), RiskLevel::Critical);
        assert_eq!(scorer.score(Category::DangerousCommand, "ls -la"), RiskLevel::Medium);
    }

    #[test]
    fn wildcard_network_target_is_high() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.score(Category::NetworkCall, "POST *.example.com/collect"), RiskLevel::High);
        assert_eq!(scorer.score(Category::NetworkCall, "GET api.github.com/user"), RiskLevel::Low);
    }

    #[test]
    fn repeated_matches_escalate_past_single_hit_level() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.score(Category::FileWrite, "/etc/hosts"), RiskLevel::High);
        assert_eq!(scorer.score(Category::FileWrite, "/etc/hosts"), RiskLevel::High);
        assert_eq!(scorer.score(Category::FileWrite, "/etc/hosts"), RiskLevel::Critical);
    }
}
