//! UTF-8 safe truncation for command and hook output.

/// Marker appended to output cut by [`truncate_output`].
pub const TRUNCATION_MARKER: &str = "\n\n(output truncated)";

/// Largest byte index <= `i` that falls on a char boundary.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Truncate `&str` to at most `max_bytes`, never splitting a codepoint.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    &s[..floor_char_boundary(s, max_bytes)]
}

/// Cut `text` in place to `max_bytes` and append [`TRUNCATION_MARKER`].
/// Returns whether anything was removed.
pub fn truncate_output(text: &mut String, max_bytes: usize) -> bool {
    if text.len() <= max_bytes {
        return false;
    }
    text.truncate(floor_char_boundary(text, max_bytes));
    text.push_str(TRUNCATION_MARKER);
    true
}
