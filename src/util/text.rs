use std::borrow::Cow;

/// Returns true for characters that cannot appear in an XML 1.0 document,
/// plus DEL, which is legal XML but never meaningful in feed text.
fn is_disallowed(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => false,
        '\u{0}'..='\u{1f}' | '\u{7f}' => true,
        '\u{fffe}' | '\u{ffff}' => true,
        _ => false,
    }
}

/// SEC-001: Strip characters that XML 1.0 forbids from upstream text.
///
/// Titles, author handles and self-post bodies come straight from the
/// upstream API. A single stray control character would make the whole
/// rendered document ill-formed, so the renderer passes every user-sourced
/// string through here before handing it to the XML writer.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - The noncharacters U+FFFE and U+FFFF
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
///
/// # Examples
///
/// ```
/// use hnrss::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("Show HN: \u{1b}[31mred"), "Show HN: [31mred");
/// assert_eq!(strip_control_chars("line\nbreak"), "line\nbreak");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_disallowed) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_disallowed(c)).collect())
}

/// Collapses every run of whitespace (including newlines) into a single
/// space and trims both ends.
///
/// Feed readers display titles on one line; upstream titles occasionally
/// carry stray newlines or doubled spaces.
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    let needs_work = trimmed.len() != s.len()
        || trimmed
            .as_bytes()
            .windows(2)
            .any(|w| w[0].is_ascii_whitespace() && w[1].is_ascii_whitespace())
        || trimmed.chars().any(|c| c.is_whitespace() && c != ' ');

    if !needs_work {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(trimmed.len());
    for word in trimmed.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}
