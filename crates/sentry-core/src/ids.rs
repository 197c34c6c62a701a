//! Opaque identifiers for the entities in the data model.
//!
//! Every entity in the spec has "an opaque string identifier"; we represent
//! that as a UUIDv4 wrapped in a newtype with a short human-readable
//! `Display` prefix, matching the convention already used for the request
//! and audit identifiers this crate's sibling security crates were
//! originally grounded on.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(raw)?))
            }
        }
    };
}

uuid_id!(OwnerId, "owner", "Identifies the human account that owns sessions, credentials and approvals.");
uuid_id!(SessionId, "sess", "Identifies a single authenticated session on a paired device.");
uuid_id!(DeviceId, "dev", "Identifies a paired device.");
uuid_id!(CredentialId, "cred", "Identifies a stored credential.");
uuid_id!(ApprovalRequestId, "req", "Identifies an approval request.");
uuid_id!(AuditEntryId, "audit", "Identifies an audit log entry.");
uuid_id!(CostEntryId, "cost", "Identifies a cost entry.");
uuid_id!(UndoTicketId, "undo", "Identifies an undo ticket.");
uuid_id!(TrustSignalId, "signal", "Identifies a trust signal measurement.");
uuid_id!(RegressionId, "regress", "Identifies a trust regression event.");

/// A parsed `provider:model` or bare `model` routing candidate.
///
/// A bare `model` means "implicit provider = first registered local
/// provider", per the Model Router's candidate grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Explicit provider name, if the spec was `provider:model`.
    pub provider: Option<String>,
    /// The model identifier.
    pub model: String,
}

impl ModelSpec {
    /// Resolve the provider name, falling back to `default_provider` for a
    /// bare model spec.
    #[must_use]
    pub fn provider_or<'a>(&'a self, default_provider: &'a str) -> &'a str {
        self.provider.as_deref().unwrap_or(default_provider)
    }
}

impl FromStr for ModelSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, model)) => Ok(Self {
                provider: Some(provider.to_string()),
                model: model.to_string(),
            }),
            None => Ok(Self {
                provider: None,
                model: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}:{}", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrip() {
        let id = OwnerId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("owner:"));
        let parsed: OwnerId = rendered.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn model_spec_parses_explicit_provider() {
        let spec: ModelSpec = "anthropic:claude-3.5-sonnet".parse().unwrap();
        assert_eq!(spec.provider.as_deref(), Some("anthropic"));
        assert_eq!(spec.model, "claude-3.5-sonnet");
    }

    #[test]
    fn model_spec_parses_bare_model() {
        let spec: ModelSpec = "llama3".parse().unwrap();
        assert_eq!(spec.provider, None);
        assert_eq!(spec.provider_or("ollama"), "ollama");
    }
}
