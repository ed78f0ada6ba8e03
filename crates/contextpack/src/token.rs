//! Pure token estimator (§4.3). No tokenizer dependency; a conservative
//! character-budget approximation, analogous in spirit to
//! `truncation`'s character accounting but token- rather than
//! character-denominated.

const CHARS_PER_TOKEN: f64 = 3.5;
const SAFETY_BUFFER: f64 = 0.05;
const PER_MESSAGE_OVERHEAD: usize = 4;
const PER_CONVERSATION_OVERHEAD: usize = 3;

/// Estimate the token count of a raw string.
pub fn estimate(text: &str) -> usize {
    let raw_tokens = (text.len() as f64 / CHARS_PER_TOKEN).ceil();
    (raw_tokens * (1.0 + SAFETY_BUFFER)).ceil() as usize
}

/// Estimate the token count of one chat message, including the role
/// label and the fixed per-message overhead.
pub fn estimate_message(role_label: &str, content: &str) -> usize {
    estimate(content) + estimate(role_label) + PER_MESSAGE_OVERHEAD
}

/// Fixed overhead charged once per assembled conversation.
pub fn conversation_overhead() -> usize {
    PER_CONVERSATION_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn estimate_overestimates_short_text() {
        // 7 chars / 3.5 = 2 tokens, * 1.05 = 2.1 -> ceil 3
        assert_eq!(estimate("abcdefg"), 3);
    }

    #[test]
    fn estimate_is_monotonic_in_length() {
        assert!(estimate("a".repeat(100).as_str()) > estimate("a".repeat(10).as_str()));
    }

    #[test]
    fn message_overhead_adds_role_and_fixed_cost() {
        let bare = estimate("hello");
        let with_role = estimate_message("user", "hello");
        assert!(with_role > bare + PER_MESSAGE_OVERHEAD - 1);
    }
}
