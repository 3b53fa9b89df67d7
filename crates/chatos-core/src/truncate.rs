//! UTF-8-safe truncation helpers shared by the process runner and LLM
//! driver's output-cap enforcement.

/// Truncate `s` to at most `max_bytes`, never splitting a multi-byte UTF-8
/// character. Returns the truncated prefix.
#[must_use]
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` to at most `max_chars` characters (not bytes), appending a
/// `"…[truncated N chars]"` marker describing how many characters were
/// dropped, as used for oversized strings in persisted log/event payloads.
#[must_use]
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars).collect();
    let dropped = total - max_chars;
    format!("{kept}\u{2026}[truncated {dropped} chars]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_at_char_boundary_ascii() {
        assert_eq!(truncate_at_char_boundary("hello world", 5), "hello");
    }

    #[test]
    fn truncate_at_char_boundary_no_op_when_short() {
        assert_eq!(truncate_at_char_boundary("hi", 100), "hi");
    }

    #[test]
    fn truncate_at_char_boundary_multibyte() {
        // "héllo": 'é' is 2 bytes, so byte offset 2 falls mid-character.
        let s = "héllo";
        let truncated = truncate_at_char_boundary(s, 2);
        assert_eq!(truncated, "h");
        assert!(s.as_bytes().len() > truncated.len());
    }

    #[test]
    fn truncate_at_char_boundary_emoji() {
        let s = "a😀b";
        for n in 0..=s.len() {
            // Must never panic regardless of where the cut falls.
            let _ = truncate_at_char_boundary(s, n);
        }
    }

    #[test]
    fn truncate_with_marker_adds_count() {
        let s = "0123456789";
        let out = truncate_with_marker(s, 4);
        assert_eq!(out, "0123\u{2026}[truncated 6 chars]");
    }

    #[test]
    fn truncate_with_marker_no_op_when_short() {
        assert_eq!(truncate_with_marker("short", 100), "short");
    }
}
