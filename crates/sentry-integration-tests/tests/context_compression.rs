//! A 20-turn conversation well over budget is compressed into a single
//! summary turn plus the trailing window, kept verbatim.

use sentry_core::{ConversationTurn, Role};
use sentry_pipeline::compress::{compress, CompressorConfig};

#[test]
fn long_conversation_is_summarized_and_windowed() {
    let turns: Vec<ConversationTurn> = (0..20)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            ConversationTurn::new(role, "x".repeat(1000), i)
        })
        .collect();

    let config = CompressorConfig {
        max_context_tokens: 2000,
        window_size: 5,
        chars_per_token: 4.0,
        summarize_old: true,
        ..Default::default()
    };

    let result = compress(&turns, &config);

    assert!(result.ratio < 1.0);
    assert_eq!(result.turns_removed, 15);

    let summaries: Vec<_> = result.turns.iter().filter(|t| t.role == Role::System).collect();
    assert_eq!(summaries.len(), 1);
    let summary_turn = summaries[0];
    assert!(summary_turn.content.starts_with("[Context summary:"));
    assert!(sentry_core::estimate_tokens(&summary_turn.content, config.chars_per_token) <= config.max_summary_tokens);

    let last_five: Vec<usize> = turns[15..].iter().map(|t| t.original_index).collect();
    for idx in last_five {
        assert!(result.turns.iter().any(|t| t.original_index == idx), "trailing window turn {idx} must survive verbatim");
    }
}
