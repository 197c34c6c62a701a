//! Heuristic prompt complexity classification.

use crate::types::Complexity;

const COMPLEX_PATTERNS: &[&str] = &[
    "analyze", "analyse", "design", "refactor", "optimize", "optimise", "architect", "vulnerability", "vuln",
    "security", "exploit", "cve", "algorithm", "data structure", "big o", "concurrency", "race condition",
];

const SIMPLE_PATTERNS: &[&str] =
    &["list", "show", "what is", "what's", "summarize", "summarise", "translate", "define"];

const SIMPLE_LENGTH_THRESHOLD: usize = 100;
const COMPLEX_LENGTH_THRESHOLD: usize = 1000;

/// Classify `prompt` into a complexity bucket.
///
/// Complex patterns win over simple ones when both appear (e.g. "list the
/// vulnerabilities" is complex); otherwise length decides.
#[must_use]
pub fn classify_complexity(prompt: &str) -> Complexity {
    let lower = prompt.to_lowercase();

    if COMPLEX_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Complexity::Complex;
    }
    if SIMPLE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Complexity::Simple;
    }

    match prompt.chars().count() {
        n if n < SIMPLE_LENGTH_THRESHOLD => Complexity::Simple,
        n if n > COMPLEX_LENGTH_THRESHOLD => Complexity::Complex,
        _ => Complexity::Moderate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lookup_is_simple() {
        assert_eq!(classify_complexity("what is rust"), Complexity::Simple);
    }

    #[test]
    fn analysis_verb_is_complex_regardless_of_length() {
        assert_eq!(classify_complexity("please analyze this"), Complexity::Complex);
    }

    #[test]
    fn complex_pattern_wins_over_simple_pattern() {
        assert_eq!(classify_complexity("list the known vulnerabilities in this module"), Complexity::Complex);
    }

    #[test]
    fn long_plain_text_without_keywords_is_complex() {
        let prompt = "word ".repeat(300);
        assert_eq!(classify_complexity(&prompt), Complexity::Complex);
    }

    #[test]
    fn mid_length_plain_text_is_moderate() {
        let prompt = "word ".repeat(50);
        assert_eq!(classify_complexity(&prompt), Complexity::Moderate);
    }
}
