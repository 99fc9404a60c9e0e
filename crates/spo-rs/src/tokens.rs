//! Approximate token counting for answer sets.
//!
//! The count recorded in `results.json` is a size signal for comparing
//! rounds, so a character-ratio estimate is enough.

use crate::template::QaPair;

/// Characters per token for English text. Most tokenizers land between 3
/// and 4; 3.5 is the middle.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Estimate tokens in a piece of text.
pub fn estimate_tokens(text: &str) -> u64 {
    estimate_tokens_with(text, DEFAULT_CHARS_PER_TOKEN)
}

/// Estimate tokens using a custom chars-per-token ratio.
pub fn estimate_tokens_with(text: &str, chars_per_token: f64) -> u64 {
    let chars = text.chars().count();
    if chars == 0 || chars_per_token <= 0.0 {
        return 0;
    }
    (chars as f64 / chars_per_token).ceil() as u64
}

/// Estimate tokens across every question and answer in a set.
pub fn count_answer_tokens(answers: &[QaPair]) -> u64 {
    answers
        .iter()
        .map(|qa| estimate_tokens(&qa.question) + estimate_tokens(&qa.answer))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(count_answer_tokens(&[]), 0);
    }

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcdefg"), 2);
        assert_eq!(estimate_tokens("abcdefgh"), 3);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(estimate_tokens_with("ééé", 1.0), 3);
    }

    #[test]
    fn non_positive_ratio_is_zero() {
        assert_eq!(estimate_tokens_with("text", 0.0), 0);
    }

    #[test]
    fn answer_set_sums_questions_and_answers() {
        let answers = vec![QaPair::new("abc", "abcdefg"), QaPair::new("", "a")];
        assert_eq!(count_answer_tokens(&answers), 1 + 2 + 1);
    }
}
