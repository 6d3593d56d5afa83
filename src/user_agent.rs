//! Default User-Agent string.

/// Default User-Agent sent with every request unless the caller sets one.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("by-request/{version}")
}
