//! Value cleaning applied to every captured parameter before storage.

/// Characters removed from captured values.
pub const FORBIDDEN_CHARS: [char; 5] = ['<', '>', '"', '\'', '`'];

/// Truncate to `max_len` characters, drop [`FORBIDDEN_CHARS`], trim.
///
/// Truncation happens first, so the result never exceeds `max_len`
/// characters regardless of how many characters are removed.
pub fn sanitize_value(raw: &str, max_len: usize) -> String {
    let cleaned: String = raw
        .chars()
        .take(max_len)
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    cleaned.trim().to_string()
}
