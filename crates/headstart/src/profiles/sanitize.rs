use std::sync::OnceLock;

use regex::Regex;

/// Escape characters that carry meaning in HTML so stored text renders inert. `/` is
/// left alone so taxonomy labels such as `UI/UX Design` survive storage.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '\\' => escaped.push_str("&#x5C;"),
            '`' => escaped.push_str("&#96;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Trim, then escape.
pub fn sanitize_text(raw: &str) -> String {
    escape_html(raw.trim())
}

/// Trim, cut to `max` characters, then escape. Cutting first keeps entities whole.
pub fn sanitize_truncated(raw: &str, max: usize) -> String {
    escape_html(&truncate_chars(raw.trim(), max))
}

/// Keep the first `max` characters (not bytes).
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

pub fn is_valid_email(candidate: &str) -> bool {
    email_pattern().is_match(candidate)
}
