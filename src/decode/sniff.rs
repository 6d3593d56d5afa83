//! Embedded encoding declarations: XML prolog, HTML `<meta>`, CSS `@charset`.

use std::sync::LazyLock;

use regex::Regex;

/// Number of leading body bytes examined for a declaration.
pub const MAX_EXAMINE: usize = 2048;

#[allow(clippy::expect_used)]
static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--.*?-->").expect("comment regex is valid") // Static pattern, safe to panic
});

/// A complete tag, or an unterminated one cut off by the examined window.
#[allow(clippy::expect_used)]
static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]*(?:>|$)").expect("tag regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static XML_PROLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<\?xml\b").expect("xml prolog regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static XML_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bencoding\s*=\s*['"]\s*([\w\-]+)\b"#).expect("xml encoding regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<meta\b").expect("meta regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bcharset\s*=\s*['"]?\s*([\w\-]+)\b"#).expect("meta charset regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HTTP_EQUIV_CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bhttp-equiv\s*=\s*['"]?\s*content-type\b"#).expect("http-equiv regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static META_CONTENT_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bcontent\s*=\s*['"]?.*;\s*charset\s*=\s*([\w\-]+)\b"#)
        .expect("meta content regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static CSS_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^@charset\s+['"]\s*([\w\-]+)\b"#).expect("css charset regex is valid") // Static pattern, safe to panic
});

/// Looks for a declared encoding near the start of a body.
///
/// A 16/32-bit code unit layout in the first four bytes is reported
/// directly, since such content cannot be scanned as ASCII markup.
#[must_use]
pub fn sniff_embedded_encoding(data: &[u8]) -> Option<String> {
    if let Some(wide) = wide_encoding(data) {
        return Some(wide.to_string());
    }

    let window = &data[..data.len().min(MAX_EXAMINE)];
    let text: String = window
        .iter()
        .map(|&b| {
            if b.is_ascii() {
                char::from(b.to_ascii_lowercase())
            } else {
                char::REPLACEMENT_CHARACTER
            }
        })
        .collect();
    let flattened = text.replace(['\r', '\n'], " ");
    let tag_text = COMMENT.replace_all(&flattened, "");
    let tag_text = tag_text.trim();

    for tag in TAG.find_iter(tag_text).map(|m| m.as_str()) {
        if tag.starts_with("</") {
            continue;
        }
        if let Some(found) = declared_in_tag(tag) {
            return Some(found);
        }
    }

    CSS_CHARSET
        .captures(tag_text)
        .map(|caps| caps[1].to_string())
}

fn declared_in_tag(tag: &str) -> Option<String> {
    if XML_PROLOG.is_match(tag) {
        return XML_ENCODING.captures(tag).map(|caps| caps[1].to_string());
    }

    if META.is_match(tag) {
        if let Some(caps) = META_CHARSET.captures(tag) {
            return Some(caps[1].to_string());
        }
        if HTTP_EQUIV_CONTENT_TYPE.is_match(tag) {
            return META_CONTENT_CHARSET
                .captures(tag)
                .map(|caps| caps[1].to_string());
        }
    }

    None
}

/// Zero-byte layout heuristic for UTF-16/UTF-32 without a BOM.
///
/// Missing bytes (short input) count as non-zero.
fn wide_encoding(data: &[u8]) -> Option<&'static str> {
    let zero = |i: usize| data.get(i) == Some(&0);

    if zero(0) && zero(1) && (!zero(2) || !zero(3)) {
        Some("utf-32be")
    } else if (!zero(0) || !zero(1)) && zero(2) && zero(3) {
        Some("utf-32le")
    } else if zero(0) && !zero(1) {
        Some("utf-16be")
    } else if !zero(0) && zero(1) {
        Some("utf-16le")
    } else {
        None
    }
}
