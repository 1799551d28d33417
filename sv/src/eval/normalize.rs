//! Output normalization and display truncation
//!
//! Comparison is whitespace-insensitive but token-sensitive. Display
//! truncation only shapes reports; it never feeds comparison.

/// Strings longer than this many characters are truncated for display
pub const DISPLAY_CHAR_LIMIT: usize = 80;

/// Characters kept on each side of a truncated string
const DISPLAY_CHAR_KEEP: usize = 35;

/// Texts with more than this many tokens are truncated by the token variant
pub const DISPLAY_TOKEN_LIMIT: usize = 30;

/// Tokens kept on each side by the token variant
const DISPLAY_TOKEN_KEEP: usize = 10;

const ELLIPSIS: &str = " ... ";

/// Collapse every whitespace run to a single space and strip both edges
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether two outputs are equal up to incidental whitespace
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    expected.split_whitespace().eq(actual.split_whitespace())
}

/// Shorten long text to `prefix ... suffix` for reports
pub fn format_for_display(text: &str) -> String {
    format_chars(text, DISPLAY_CHAR_LIMIT)
}

/// Character-limited truncation with an explicit limit
pub fn format_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    let keep = DISPLAY_CHAR_KEEP.min(limit / 2);
    let head: String = text.chars().take(keep).collect();
    let tail: String = text.chars().skip(count - keep).collect();
    format!("{}{}{}", head, ELLIPSIS, tail)
}

/// Token-limited variant: keep the first and last few whitespace-delimited tokens
pub fn format_tokens_for_display(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= DISPLAY_TOKEN_LIMIT {
        return text.to_string();
    }
    format!(
        "{}{}{}",
        tokens[..DISPLAY_TOKEN_KEEP].join(" "),
        ELLIPSIS,
        tokens[tokens.len() - DISPLAY_TOKEN_KEEP..].join(" ")
    )
}
