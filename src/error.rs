//! Error types for fetch operations.
//!
//! Every failure of a single request is delivered through [`FetchError`];
//! nothing is retried internally and no partial body is ever returned
//! alongside an error.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used for transport failures that do not come from reqwest.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP status reported for unsupported content codings and charsets.
pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;

/// Errors that can occur while fetching and decoding a response.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, mid-stream socket error).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The request did not complete within the caller's timeout.
    #[error("timeout fetching {url} after {} ms", .elapsed.as_millis())]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// Time spent before the request was aborted.
        elapsed: Duration,
    },

    /// The server answered with a status outside 200-299.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Unknown content coding, or a charset the codec cannot decode.
    #[error("Unsupported Media Type fetching {url}: {detail}")]
    UnsupportedMediaType {
        /// The URL being fetched.
        url: String,
        /// What was unsupported (coding or charset name).
        detail: String,
    },

    /// The compressed body could not be inflated.
    #[error("{coding} decompression failed for {url}: {source}")]
    Decompression {
        /// The URL being fetched.
        url: String,
        /// Content coding in effect (`gzip`, `deflate`, `br`).
        coding: &'static str,
        /// The inflater's error.
        #[source]
        source: std::io::Error,
    },

    /// File system error while writing a downloaded file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target could not be turned into a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// No usable output destination for a file download.
    #[error("invalid destination: {reason}")]
    InvalidDestination {
        /// Why the destination was rejected.
        reason: String,
    },

    /// Text was requested with the `binary` encoding.
    #[error("Binary encoding not permitted. Please use fetch_binary.")]
    BinaryNotPermitted,

    /// Neither JSON nor JSONP could be parsed from the body.
    #[error("Valid JSON not found")]
    InvalidJson,
}

impl FetchError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            elapsed,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an unsupported media type error.
    pub fn unsupported(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates a decompression error.
    pub fn decompression(
        url: impl Into<String>,
        coding: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::Decompression {
            url: url.into(),
            coding,
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid destination error.
    pub fn invalid_destination(reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            reason: reason.into(),
        }
    }

    /// Numeric status carried by this error, if it has one.
    ///
    /// Unsupported codings and charsets report 415.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::UnsupportedMediaType { .. } => Some(UNSUPPORTED_MEDIA_TYPE),
            _ => None,
        }
    }

    /// Returns true if the request was aborted by its timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
