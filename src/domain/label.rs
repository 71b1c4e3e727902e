// Label text helpers shared by synthesis and prompt building.

/// Longest fallback label before it is cut.
pub const FALLBACK_LIMIT: usize = 60;
/// Visible characters kept when a fallback label is cut.
pub const FALLBACK_KEEP: usize = 57;
/// Default limit for conditions and operator tokens.
pub const SHORT_LIMIT: usize = 30;

/// Collapse every whitespace run (including newlines) into one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fallback label: flattened source text capped at 57 chars plus `...`.
pub fn flatten(text: &str) -> String {
    let flat = collapse_whitespace(text);
    if flat.chars().count() > FALLBACK_LIMIT {
        let kept: String = flat.chars().take(FALLBACK_KEEP).collect();
        format!("{}...", kept)
    } else {
        flat
    }
}

/// Cut `text` to `max` chars, marking the cut with `…`.
pub fn shorten(text: &str, max: usize) -> String {
    let flat = collapse_whitespace(text);
    if flat.chars().count() > max {
        let kept: String = flat.chars().take(max).collect();
        format!("{}…", kept)
    } else {
        flat
    }
}

/// Cut without a marker; used for error messages.
pub fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
