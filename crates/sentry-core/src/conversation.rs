//! The conversation turn shape shared by the Provider Adapter, Context
//! Compressor, Prompt Cache, and Model Router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::Timestamp;

/// Who produced a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
    /// A system/instruction turn.
    System,
}

/// One turn in an ordered conversation. Content is treated as opaque
/// text by every component that handles it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced this turn.
    pub role: Role,
    /// Opaque turn content.
    pub content: String,
    /// When the turn was produced, if known.
    pub timestamp: Option<Timestamp>,
    /// Arbitrary caller-supplied context.
    pub metadata: Option<Value>,
    /// Position in the original, unmodified sequence. Used to restore
    /// original ordering when a timestamp is absent or ties occur.
    pub original_index: usize,
}

impl ConversationTurn {
    /// Build a turn with no timestamp or metadata.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>, original_index: usize) -> Self {
        Self { role, content: content.into(), timestamp: None, metadata: None, original_index }
    }

    /// Estimate this turn's token count as `ceil(char_count / chars_per_token)`.
    #[must_use]
    pub fn estimate_tokens(&self, chars_per_token: f64) -> usize {
        estimate_tokens(&self.content, chars_per_token)
    }
}

/// `ceil(char_count / chars_per_token)`, the token-estimation formula
/// used across the Provider Adapter and Context Compressor whenever a
/// provider omits real usage counts.
#[must_use]
pub fn estimate_tokens(text: &str, chars_per_token: f64) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }
    (f64::from(u32::try_from(chars).unwrap_or(u32::MAX)) / chars_per_token).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abcde", 4.0), 2);
        assert_eq!(estimate_tokens("abcd", 4.0), 1);
        assert_eq!(estimate_tokens("", 4.0), 0);
    }

    #[test]
    fn turn_estimate_uses_content() {
        let turn = ConversationTurn::new(Role::User, "hello world", 0);
        assert!(turn.estimate_tokens(4.0) > 0);
    }
}
