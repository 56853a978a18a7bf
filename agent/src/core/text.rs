//! Text normalization helpers.

/// Collapse every run of whitespace into a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_joins_lines_and_tabs() {
        assert_eq!(collapse_whitespace("  Hel\tlo \n\n world  "), "Hel lo world");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
