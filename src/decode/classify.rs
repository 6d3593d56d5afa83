//! Binary/text classification from a Content-Type value.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a `charset=` parameter anywhere after the MIME type.
#[allow(clippy::expect_used)]
static CHARSET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i);\s*charset\s*=").expect("charset parameter regex is valid") // Static pattern, safe to panic
});

/// `application/*` subtypes that carry text.
const TEXTUAL_APPLICATION_SUBTYPES: &[&str] =
    &["javascript", "ecmascript", "json", "ld+json", "rtf"];

/// Returns true if a response with this Content-Type must not be decoded as text.
///
/// A `charset=` parameter always wins: the server asserted text.
#[must_use]
pub fn is_binary(content_type: &str) -> bool {
    if CHARSET_PARAM.is_match(content_type) {
        return false;
    }

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("text/") || mime.ends_with("+xml") {
        return false;
    }

    match mime.strip_prefix("application/") {
        Some(subtype) if !subtype.is_empty() => !TEXTUAL_APPLICATION_SUBTYPES.contains(&subtype),
        _ => true,
    }
}
