//! Shared text helpers

/// Prefix of `s` holding at most `max_chars` characters.
///
/// Counts `char`s rather than bytes, so the result always ends on a UTF-8
/// boundary.
///
/// # Examples
///
/// ```
/// use ragchat::util::truncate_chars;
///
/// assert_eq!(truncate_chars("hello world", 5), "hello");
/// assert_eq!(truncate_chars("日本語", 2), "日本");
/// assert_eq!(truncate_chars("short", 50), "short");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Single-line preview for terminal output: newlines collapsed, long text
/// cut with an ellipsis.
pub fn one_line_preview(s: &str, max_chars: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&flat, max_chars);
    if cut.len() < flat.len() {
        format!("{}…", cut)
    } else {
        flat
    }
}
