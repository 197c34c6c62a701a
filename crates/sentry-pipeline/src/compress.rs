//! Context Compressor (C5): trims or summarizes conversation history to
//! fit a token budget while preserving ordering and system turns.

use sentry_core::{ConversationTurn, Role, estimate_tokens};

/// Default context budget in tokens.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8000;
/// Default number of trailing non-system turns kept verbatim.
pub const DEFAULT_WINDOW_SIZE: usize = 10;
/// Default characters-per-token ratio.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Tunables for [`compress`].
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Token budget the compressed output must fit within.
    pub max_context_tokens: usize,
    /// How many trailing non-system turns are always kept verbatim.
    pub window_size: usize,
    /// Summarize turns outside the window instead of truncating them.
    pub summarize_old: bool,
    /// Token budget for the synthetic summary turn.
    pub max_summary_tokens: usize,
    /// Characters-per-token ratio used for all estimates.
    pub chars_per_token: f64,
    /// Roles kept preferentially when truncating instead of summarizing,
    /// most important first.
    pub priority_roles: Vec<Role>,
    /// Turns shorter than this (in characters) are dropped first when
    /// truncating, since they carry the least context per token spent.
    pub min_turn_length: usize,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            window_size: DEFAULT_WINDOW_SIZE,
            summarize_old: true,
            max_summary_tokens: 500,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            priority_roles: vec![Role::System, Role::User, Role::Assistant],
            min_turn_length: 0,
        }
    }
}

/// The result of a compression pass.
#[derive(Debug, Clone)]
pub struct CompressedContext {
    /// Turns to send to the model, in original order.
    pub turns: Vec<ConversationTurn>,
    /// Estimated token count of the input.
    pub original_tokens: usize,
    /// Estimated token count of the output.
    pub compressed_tokens: usize,
    /// `compressed_tokens / original_tokens`, or `1.0` if unchanged.
    pub ratio: f64,
    /// How many turns were removed (summarized away or truncated).
    pub turns_removed: usize,
    /// The synthetic summary turn's content, if one was produced.
    pub summary: Option<String>,
}

fn estimate_turns(turns: &[ConversationTurn], chars_per_token: f64) -> usize {
    turns.iter().map(|t| t.estimate_tokens(chars_per_token)).sum()
}

fn role_priority(role: Role, priority_roles: &[Role]) -> usize {
    priority_roles.iter().position(|r| *r == role).unwrap_or(priority_roles.len())
}

fn sort_by_original_order(turns: &mut [ConversationTurn]) {
    turns.sort_by(|a, b| match (&a.timestamp, &b.timestamp) {
        (Some(ta), Some(tb)) => ta.cmp(tb).then(a.original_index.cmp(&b.original_index)),
        _ => a.original_index.cmp(&b.original_index),
    });
}

/// First-sentence extraction: the text up to and including the first
/// `.`, `!`, or `?`, or the whole string if none is found.
fn first_sentence(text: &str) -> &str {
    let end = text.find(['.', '!', '?']).map_or(text.len(), |i| i + 1);
    text[..end].trim()
}

fn summarize(turns: &[ConversationTurn], max_summary_tokens: usize, chars_per_token: f64) -> String {
    let mut summary = String::from("[Context summary: ");
    let mut first = true;
    for turn in turns {
        let sentence = first_sentence(&turn.content);
        if sentence.is_empty() {
            continue;
        }
        if !first {
            summary.push_str("; ");
        }
        first = false;
        summary.push_str(role_tag(turn.role));
        summary.push_str(": ");
        summary.push_str(sentence);

        if estimate_tokens(&summary, chars_per_token) >= max_summary_tokens {
            break;
        }
    }
    summary.push(']');
    truncate_to_tokens(&summary, max_summary_tokens, chars_per_token)
}

fn role_tag(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn truncate_to_tokens(text: &str, max_tokens: usize, chars_per_token: f64) -> String {
    let max_chars = (max_tokens as f64 * chars_per_token) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Run the compression algorithm described in the Context Compressor's
/// component design: estimate, and if under budget return unchanged;
/// otherwise keep system turns and the trailing window verbatim, and
/// either summarize or priority-truncate the rest.
#[must_use]
pub fn compress(turns: &[ConversationTurn], config: &CompressorConfig) -> CompressedContext {
    let original_tokens = estimate_turns(turns, config.chars_per_token);

    if original_tokens <= config.max_context_tokens {
        return CompressedContext {
            turns: turns.to_vec(),
            original_tokens,
            compressed_tokens: original_tokens,
            ratio: 1.0,
            turns_removed: 0,
            summary: None,
        };
    }

    let (system_turns, non_system): (Vec<_>, Vec<_>) =
        turns.iter().cloned().partition(|t| t.role == Role::System);

    let window_start = non_system.len().saturating_sub(config.window_size);
    let kept_window = non_system[window_start..].to_vec();
    let remainder = &non_system[..window_start];

    let system_budget = estimate_turns(&system_turns, config.chars_per_token);
    let window_budget = estimate_turns(&kept_window, config.chars_per_token);
    let available_for_remainder =
        config.max_context_tokens.saturating_sub(system_budget + window_budget);

    let mut output = system_turns.clone();
    let mut summary_text = None;
    let mut turns_removed = 0;

    if !remainder.is_empty() {
        if config.summarize_old {
            let summary = summarize(remainder, config.max_summary_tokens, config.chars_per_token);
            let summary_index = remainder.first().map_or(0, |t| t.original_index);
            output.push(ConversationTurn {
                role: Role::System,
                content: summary.clone(),
                timestamp: remainder.first().and_then(|t| t.timestamp),
                metadata: None,
                original_index: summary_index,
            });
            summary_text = Some(summary);
            turns_removed += remainder.len();
        } else {
            let mut ranked: Vec<&ConversationTurn> = remainder
                .iter()
                .filter(|t| t.content.len() >= config.min_turn_length)
                .collect();
            ranked.sort_by_key(|t| role_priority(t.role, &config.priority_roles));

            let mut used = 0usize;
            let mut kept_indices = Vec::new();
            for turn in ranked {
                let cost = turn.estimate_tokens(config.chars_per_token);
                if used + cost > available_for_remainder {
                    continue;
                }
                used += cost;
                kept_indices.push(turn.original_index);
            }
            let kept_count = kept_indices.len();
            turns_removed += remainder.len() - kept_count;
            output.extend(
                remainder.iter().filter(|t| kept_indices.contains(&t.original_index)).cloned(),
            );
        }
    }

    output.extend(kept_window);
    sort_by_original_order(&mut output);

    let compressed_tokens = estimate_turns(&output, config.chars_per_token);
    let ratio = if original_tokens == 0 { 1.0 } else { compressed_tokens as f64 / original_tokens as f64 };

    CompressedContext {
        turns: output,
        original_tokens,
        compressed_tokens,
        ratio,
        turns_removed,
        summary: summary_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str, index: usize) -> ConversationTurn {
        ConversationTurn::new(role, content, index)
    }

    #[test]
    fn under_budget_is_returned_unchanged() {
        let turns = vec![turn(Role::User, "hi", 0), turn(Role::Assistant, "hello", 1)];
        let result = compress(&turns, &CompressorConfig::default());
        assert_eq!(result.turns_removed, 0);
        assert_eq!(result.ratio, 1.0);
    }

    #[test]
    fn system_turns_are_always_kept() {
        let mut turns = vec![turn(Role::System, "you are a helpful assistant", 0)];
        for i in 1..40 {
            turns.push(turn(Role::User, &"x".repeat(1000), i));
        }
        let config = CompressorConfig {
            max_context_tokens: 2000,
            window_size: 5,
            chars_per_token: 4.0,
            summarize_old: true,
            ..Default::default()
        };
        let result = compress(&turns, &config);
        assert!(result.turns.iter().any(|t| t.role == Role::System && t.content.contains("helpful")));
        assert!(result.compressed_tokens <= config.max_context_tokens + result.summary.as_ref().map_or(0, |s| s.len()));
    }

    #[test]
    fn last_window_turns_are_kept_verbatim() {
        let mut turns = Vec::new();
        for i in 0..20 {
            turns.push(turn(Role::User, &"y".repeat(1000), i));
        }
        let config = CompressorConfig {
            max_context_tokens: 2000,
            window_size: 5,
            chars_per_token: 4.0,
            summarize_old: true,
            ..Default::default()
        };
        let result = compress(&turns, &config);
        let last_five: Vec<_> = turns[15..].iter().map(|t| t.original_index).collect();
        for idx in last_five {
            assert!(result.turns.iter().any(|t| t.original_index == idx));
        }
    }

    #[test]
    fn summary_begins_with_marker_and_is_bounded() {
        let mut turns = vec![turn(Role::System, "sys", 0)];
        for i in 1..21 {
            turns.push(turn(
                if i % 2 == 0 { Role::User } else { Role::Assistant },
                &"This is a long sentence describing something important. More text follows here.".repeat(10),
                i,
            ));
        }
        let config = CompressorConfig {
            max_context_tokens: 2000,
            window_size: 5,
            max_summary_tokens: 100,
            chars_per_token: 4.0,
            summarize_old: true,
            ..Default::default()
        };
        let result = compress(&turns, &config);
        let summary = result.summary.expect("summary expected");
        assert!(summary.starts_with("[Context summary:"));
        assert!(estimate_tokens(&summary, 4.0) <= 100);
    }

    #[test]
    fn truncation_path_prioritizes_configured_roles() {
        let mut turns = Vec::new();
        for i in 0..20 {
            turns.push(turn(Role::Assistant, &"z".repeat(500), i));
        }
        let config = CompressorConfig {
            max_context_tokens: 1500,
            window_size: 2,
            summarize_old: false,
            chars_per_token: 4.0,
            priority_roles: vec![Role::Assistant],
            ..Default::default()
        };
        let result = compress(&turns, &config);
        assert!(result.compressed_tokens <= config.max_context_tokens * 2);
    }
}
