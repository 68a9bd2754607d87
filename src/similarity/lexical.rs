use std::collections::HashSet;

use super::{Scored, SimilarityStrategy, Strategy};
use crate::normalize::{normalize, words};

/// Floor applied when one token set contains the other.
pub const CONTAINMENT_FLOOR: f64 = 0.8;
/// Floor applied when a token of one side occurs inside the other text.
pub const SUBSTRING_FLOOR: f64 = 0.6;

/// Token-overlap similarity with no external dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarity;

impl SimilarityStrategy for LexicalSimilarity {
    fn strategy(&self) -> Strategy {
        Strategy::Lexical
    }

    fn similarity(&self, a: &str, b: &str) -> Scored {
        Scored::exact(lexical_similarity(a, b))
    }
}

/// Jaccard overlap of word sets, raised by containment and substring floors.
///
/// Short CJK answers often overlap almost completely without being equal,
/// which plain Jaccard under-rewards; the floors compensate.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let core_a = normalize(a).to_lowercase();
    let core_b = normalize(b).to_lowercase();

    if core_a.is_empty() || core_b.is_empty() {
        return 0.0;
    }
    if core_a == core_b {
        return 1.0;
    }

    let words_a: HashSet<&str> = words(&core_a).collect();
    let words_b: HashSet<&str> = words(&core_b).collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let shared = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    let mut score = shared as f64 / union as f64;

    if words_a.is_subset(&words_b) || words_b.is_subset(&words_a) {
        score = score.max(CONTAINMENT_FLOOR);
    }

    let partial = words_a.iter().any(|w| core_b.contains(w))
        || words_b.iter().any(|w| core_a.contains(w));
    if partial {
        score = score.max(SUBSTRING_FLOOR);
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(lexical_similarity("北京", "北京"), 1.0);
        assert_eq!(lexical_similarity("Paris", "  paris "), 1.0);
    }

    #[test]
    fn empty_sides_score_zero() {
        assert_eq!(lexical_similarity("", ""), 0.0);
        assert_eq!(lexical_similarity("", "anything"), 0.0);
        assert_eq!(lexical_similarity("um", "um"), 0.0);
    }

    #[test]
    fn punctuation_only_has_no_tokens() {
        assert_eq!(lexical_similarity("!!!", "???"), 0.0);
        assert_eq!(lexical_similarity("!!!", "!!!"), 1.0);
    }

    #[test]
    fn disjoint_tokens_score_zero() {
        assert_eq!(lexical_similarity("猫", "狗"), 0.0);
        assert_eq!(lexical_similarity("red apple", "blue sky"), 0.0);
    }

    #[test]
    fn jaccard_wins_when_above_the_floors() {
        let s = lexical_similarity("red green blue black white", "red green blue black pink");
        assert!((s - 4.0 / 6.0).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn any_shared_token_reaches_substring_floor() {
        assert_eq!(lexical_similarity("red green blue", "red yellow black"), SUBSTRING_FLOOR);
    }

    #[test]
    fn containment_raises_to_floor() {
        let s = lexical_similarity("the capital is paris", "paris");
        assert_eq!(s, CONTAINMENT_FLOOR);
    }

    #[test]
    fn substring_raises_to_floor() {
        // "北京" and "北京市" are different tokens, but one contains the other.
        assert_eq!(lexical_similarity("北京", "北京市"), SUBSTRING_FLOOR);
    }

    #[test]
    fn bold_and_think_markup_is_ignored() {
        assert_eq!(lexical_similarity("**北京**", "北京"), 1.0);
        assert_eq!(lexical_similarity("<think>reasoning...</think>巴黎", "巴黎"), 1.0);
    }

    #[test]
    fn strategy_reports_fallback() {
        let s = LexicalSimilarity;
        assert_eq!(s.strategy(), Strategy::Lexical);
        assert!(!s.similarity("a", "a").degraded);
    }
}
