//! Request descriptor and response metadata.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::error::FetchError;

/// Progress observer: `(bytes_read, total_if_known)`, called per wire chunk.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Receives the response metadata once the body has been read.
pub type ResponseInfoCallback = Arc<dyn Fn(&ResponseInfo) + Send + Sync>;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A complete URL string.
    Url(String),
    /// A URL assembled from its parts.
    Parts {
        /// `http` or `https`, with or without a trailing colon.
        protocol: String,
        /// Host name or address.
        host: String,
        /// Explicit port, if not the scheme default.
        port: Option<u16>,
        /// Path plus optional query, e.g. `/index.html?x=1`.
        path: String,
    },
}

impl Target {
    /// Resolves the target to a validated absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if the URL does not parse or is
    /// not `http`/`https`.
    pub fn to_url(&self) -> Result<Url, FetchError> {
        let raw = match self {
            Self::Url(url) => url.trim().to_string(),
            Self::Parts {
                protocol,
                host,
                port,
                path,
            } => {
                let scheme = protocol.trim_end_matches(':');
                let port = port.map(|p| format!(":{p}")).unwrap_or_default();
                let slash = if path.starts_with('/') { "" } else { "/" };
                format!("{scheme}://{host}{port}{slash}{path}")
            }
        };

        let url = Url::parse(&raw).map_err(|_| FetchError::invalid_url(raw.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(FetchError::invalid_url(raw));
        }
        Ok(url)
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<Url> for Target {
    fn from(url: Url) -> Self {
        Self::Url(url.into())
    }
}

impl From<&Url> for Target {
    fn from(url: &Url) -> Self {
        Self::Url(url.to_string())
    }
}

/// How the body should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Text or bytes, as the Content-Type suggests.
    Auto,
    /// Always decode to text.
    Text,
    /// Never decode.
    Binary,
    /// Forward raw bytes to a file or writer.
    Sink,
}

/// Per-call options.
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// HTTP method, GET by default.
    pub method: Method,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Fallback charset when the response does not declare one.
    pub default_encoding: Option<String>,
    /// Decode with `default_encoding` no matter what the response says.
    pub force_encoding: bool,
    /// Skip byte-order mark detection.
    pub ignore_bom: bool,
    /// Keep a detected byte-order mark in the decoded text.
    pub keep_bom: bool,
    /// Leave a compressed body compressed.
    pub dont_decompress: bool,
    /// Leave a caller-supplied writer open after the body is written.
    pub dont_end_stream: bool,
    /// Progress observer.
    pub progress: Option<ProgressCallback>,
    /// Response metadata observer.
    pub response_info: Option<ResponseInfoCallback>,
    /// Limit on the whole operation, headers through last byte.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("default_encoding", &self.default_encoding)
            .field("force_encoding", &self.force_encoding)
            .field("ignore_bom", &self.ignore_bom)
            .field("keep_bom", &self.keep_bom)
            .field("dont_decompress", &self.dont_decompress)
            .field("dont_end_stream", &self.dont_end_stream)
            .field("progress", &self.progress.is_some())
            .field("response_info", &self.response_info.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FetchOptions {
    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a request header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the fallback charset.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.default_encoding = Some(encoding.into());
        self
    }

    /// Forces the fallback charset. Has no effect without one.
    #[must_use]
    pub fn with_force_encoding(mut self) -> Self {
        self.force_encoding = true;
        self
    }

    /// Disables BOM detection.
    #[must_use]
    pub fn with_ignore_bom(mut self) -> Self {
        self.ignore_bom = true;
        self
    }

    /// Keeps a detected BOM in decoded text.
    #[must_use]
    pub fn with_keep_bom(mut self) -> Self {
        self.keep_bom = true;
        self
    }

    /// Disables automatic decompression.
    #[must_use]
    pub fn with_dont_decompress(mut self) -> Self {
        self.dont_decompress = true;
        self
    }

    /// Leaves a caller-supplied writer open.
    #[must_use]
    pub fn with_dont_end_stream(mut self) -> Self {
        self.dont_end_stream = true;
        self
    }

    /// Sets the progress observer.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Sets the response metadata observer.
    #[must_use]
    pub fn with_response_info(
        mut self,
        observer: impl Fn(&ResponseInfo) + Send + Sync + 'static,
    ) -> Self {
        self.response_info = Some(Arc::new(observer));
        self
    }

    /// Sets the overall timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Metadata about a completed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseInfo {
    /// A byte-order mark was found.
    pub bom_detected: bool,
    /// The byte-order mark was stripped from the decoded text.
    pub bom_removed: bool,
    /// JSONP callback name, when the body was a JSONP wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    /// Charset used to decode, or `binary`.
    pub charset: String,
    /// Content coding of the response, `identity` if none.
    pub content_encoding: String,
    /// Bytes read from the wire.
    pub content_length: u64,
    /// Lower-cased Content-Type.
    pub content_type: String,
    /// HTTP status code.
    pub status: u16,
}

/// Result of [`Client::fetch`](crate::Client::fetch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Decoded text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Number of bytes written to a destination.
    Written(u64),
}

impl Body {
    /// The text, if this body was decoded.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The raw bytes, if this body was not decoded.
    #[must_use]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}
