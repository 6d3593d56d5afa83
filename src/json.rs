//! JSON and JSONP bodies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// A block comment, single line, plus trailing whitespace.
#[allow(clippy::expect_used)]
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*.*\*/\s*").expect("block comment regex is valid") // Static pattern, safe to panic
});

/// `callbackName( payload )`; the payload may span lines.
#[allow(clippy::expect_used)]
static JSONP_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*?([A-Za-z$_][0-9A-Za-z$_.]*)\s*\(((?s:.*))\)")
        .expect("jsonp wrapper regex is valid") // Static pattern, safe to panic
});

/// A parsed JSON body, with the JSONP callback name if it was wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJson {
    /// The JSON payload.
    pub value: Value,
    /// JSONP callback name.
    pub callback: Option<String>,
}

/// Parses `text` as JSON, falling back to a JSONP wrapper.
///
/// Text starting with `/*` always goes the JSONP route so that a leading
/// comment can be removed first.
///
/// # Errors
///
/// Returns [`FetchError::InvalidJson`] if neither form parses.
pub fn parse_json_or_jsonp(text: &str) -> Result<ParsedJson, FetchError> {
    if !text.starts_with("/*") {
        if let Ok(value) = serde_json::from_str(text) {
            return Ok(ParsedJson {
                value,
                callback: None,
            });
        }
    }

    let text = strip_leading_comment(text);
    let caps = JSONP_WRAPPER.captures(&text).ok_or(FetchError::InvalidJson)?;
    let callback = caps[1].to_string();
    let value = serde_json::from_str(caps[2].trim()).map_err(|_| FetchError::InvalidJson)?;
    debug!(%callback, "parsed JSONP payload");

    Ok(ParsedJson {
        value,
        callback: Some(callback),
    })
}

/// Removes the first block comment if a call follows it on the next
/// non-blank line.
fn strip_leading_comment(text: &str) -> String {
    if let Some(found) = BLOCK_COMMENT.find(text) {
        let rest = &text[found.end()..];
        if rest.lines().next().is_some_and(|line| line.contains('(')) {
            return format!("{}{rest}", &text[..found.start()]);
        }
    }
    text.to_string()
}
