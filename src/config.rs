//! Client configuration.

use std::time::Duration;

use tracing::warn;

use crate::decompress::SupportedCodings;
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large bodies).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Overrides the connect timeout, in whole seconds.
pub const ENV_CONNECT_TIMEOUT: &str = "BY_REQUEST_CONNECT_TIMEOUT_SECS";

/// Overrides the read timeout, in whole seconds.
pub const ENV_READ_TIMEOUT: &str = "BY_REQUEST_READ_TIMEOUT_SECS";

/// Narrows the content codings offered and inflated, e.g. `gzip,br`.
pub const ENV_CODINGS: &str = "BY_REQUEST_CODINGS";

/// Settings fixed for the lifetime of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Transport-level read timeout.
    pub read_timeout: Duration,
    /// User-Agent sent unless a request sets its own.
    pub user_agent: String,
    /// Content codings the decompression stage may use.
    pub codings: SupportedCodings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
            codings: SupportedCodings::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `BY_REQUEST_*` environment variables.
    ///
    /// Invalid values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_secs(&lookup, ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = secs;
        }
        if let Some(secs) = read_secs(&lookup, ENV_READ_TIMEOUT) {
            config.read_timeout = secs;
        }
        if let Some(list) = lookup(ENV_CODINGS) {
            match SupportedCodings::from_list(&list) {
                Some(codings) => config.codings = codings,
                None => warn!(variable = ENV_CODINGS, value = %list, "ignoring unknown content coding list"),
            }
        }
        config
    }

    /// Replaces the supported codings.
    #[must_use]
    pub fn with_codings(mut self, codings: SupportedCodings) -> Self {
        self.codings = codings;
        self
    }
}

fn read_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Duration> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            warn!(variable = name, value = %raw, "ignoring invalid timeout");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(300));
        assert!(config.user_agent.starts_with("by-request/"));
        assert_eq!(config.codings, SupportedCodings::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_CONNECT_TIMEOUT, "5"),
            (ENV_READ_TIMEOUT, " 60 "),
            (ENV_CODINGS, "gzip, br"),
        ]));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert!(config.codings.gzip && config.codings.brotli);
        assert!(!config.codings.deflate);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_CONNECT_TIMEOUT, "soon"),
            (ENV_READ_TIMEOUT, "0"),
            (ENV_CODINGS, "gzip, zstd"),
        ]));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_empty_coding_list_disables_compression() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_CODINGS, "")]));
        assert_eq!(config.codings, SupportedCodings::none());
    }
}
