//! Shared utility helpers.

/// Case-insensitive substring search without allocating an uppercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return false;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .any(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Strip a dangling list separator (and the whitespace around it) from the end of a line.
///
/// Returns the line unchanged when it does not end with a comma.
#[inline]
pub fn strip_trailing_separator(line: &str) -> &str {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix(',') {
        Some(rest) => rest.trim_end(),
        None => line,
    }
}

/// Wrap an identifier in back-quotes, doubling any embedded back-quote.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
