//! Per-response decode state.
//!
//! A [`DecodeState`] is created once the response headers are in, fed the
//! decompressed body chunk by chunk, and consumed by [`DecodeState::finish`].
//! Charset precedence, highest first:
//!
//! 1. a caller-forced encoding
//! 2. a byte-order mark on the first chunk
//! 3. the Content-Type `charset` parameter
//! 4. a declaration sniffed from the first chunk
//! 5. the caller's default encoding, or UTF-8
//!
//! A forced encoding still lets BOM detection and removal happen; it only
//! keeps the mark from changing the charset. Bodies handled as opaque bytes
//! skip detection altogether.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName};
use tracing::{debug, warn};

use super::bom::detect_bom;
use super::classify::is_binary;
use super::codec::{Codec, UnsupportedCharset};
use super::sniff::sniff_embedded_encoding;
use crate::request::{FetchOptions, OutputMode, ResponseInfo};

/// Charset used when nothing else decides.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Charset reported for content that is never decoded.
pub const BINARY_CHARSET: &str = "binary";

#[allow(clippy::expect_used)]
static HEADER_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bcharset\s*=\s*['"]?\s*([\w\-]+)\b"#).expect("header charset regex is valid") // Static pattern, safe to panic
});

/// Snapshot of the response metadata the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Lower-cased Content-Type, empty if absent.
    pub content_type: String,
    /// Lower-cased Content-Encoding, empty if absent.
    pub content_encoding: String,
    /// Declared Content-Length, if any and parseable.
    pub content_length: Option<u64>,
}

impl ResponseHead {
    /// Extracts the relevant headers.
    #[must_use]
    pub fn from_headers(status: u16, headers: &HeaderMap) -> Self {
        let text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_ascii_lowercase())
                .unwrap_or_default()
        };

        Self {
            status,
            content_type: text(CONTENT_TYPE),
            content_encoding: text(CONTENT_ENCODING),
            content_length: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        }
    }

    /// The Content-Type `charset` parameter, with `utf8` spelled `utf-8`.
    #[must_use]
    pub fn charset_param(&self) -> Option<String> {
        HEADER_CHARSET
            .captures(&self.content_type)
            .map(|caps| normalize_charset(&caps[1]))
    }
}

fn normalize_charset(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    if name == "utf8" {
        DEFAULT_CHARSET.to_string()
    } else {
        name
    }
}

/// Final body produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Decoded text.
    Text(String),
    /// Raw body bytes.
    Bytes(Vec<u8>),
    /// Bytes were forwarded to a sink as they arrived.
    Forwarded,
}

/// Mutable decode state for one in-flight response.
pub struct DecodeState<'a> {
    codec: &'a dyn Codec,
    head: ResponseHead,
    mode: OutputMode,
    binary: bool,
    /// Detection only feeds metadata; nothing is decoded.
    metadata_only: bool,
    charset: String,
    autodetect: bool,
    forced: bool,
    ignore_bom: bool,
    keep_bom: bool,
    bom_detected: bool,
    remove_bom: bool,
    first_chunk_seen: bool,
    bytes_read: u64,
    content: Vec<u8>,
}

impl std::fmt::Debug for DecodeState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeState")
            .field("mode", &self.mode)
            .field("binary", &self.binary)
            .field("charset", &self.charset)
            .field("autodetect", &self.autodetect)
            .field("bom_detected", &self.bom_detected)
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}

impl<'a> DecodeState<'a> {
    /// Sets up the state from the response headers.
    ///
    /// `decompressing` is false when the body will reach the pipeline still
    /// compressed; such a body is only ever handled as bytes unless text was
    /// requested explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedCharset`] if the initial charset is unknown to
    /// `codec`.
    pub fn new(
        head: ResponseHead,
        options: &FetchOptions,
        mode: OutputMode,
        decompressing: bool,
        codec: &'a dyn Codec,
    ) -> Result<Self, UnsupportedCharset> {
        let explicit = options
            .default_encoding
            .as_deref()
            .map(normalize_charset)
            .filter(|enc| !enc.is_empty());
        let forced = options.force_encoding && explicit.is_some();

        let classified_binary = is_binary(&head.content_type)
            && !explicit.as_deref().is_some_and(|enc| codec.supports(enc));

        let binary = match mode {
            OutputMode::Text => false,
            OutputMode::Binary | OutputMode::Sink => true,
            OutputMode::Auto => {
                !decompressing || classified_binary || explicit.as_deref() == Some(BINARY_CHARSET)
            }
        };
        let metadata_only = mode == OutputMode::Sink && !classified_binary && decompressing;

        let (charset, autodetect) = if forced {
            (explicit.unwrap_or_default(), false)
        } else if let Some(declared) = head.charset_param() {
            (declared, false)
        } else {
            (explicit.unwrap_or_else(|| DEFAULT_CHARSET.to_string()), true)
        };

        if !binary && !codec.supports(&charset) {
            return Err(UnsupportedCharset(charset));
        }

        debug!(
            content_type = %head.content_type,
            binary,
            %charset,
            autodetect,
            forced,
            "decode state initialised"
        );

        Ok(Self {
            codec,
            head,
            mode,
            binary,
            metadata_only,
            charset,
            autodetect: autodetect && (!binary || metadata_only),
            forced,
            ignore_bom: options.ignore_bom,
            keep_bom: options.keep_bom,
            bom_detected: false,
            remove_bom: false,
            first_chunk_seen: false,
            bytes_read: 0,
            content: Vec::new(),
        })
    }

    /// Whether the body is handled as opaque bytes.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Current best-guess charset.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Records `len` bytes read off the wire and returns the progress pair
    /// `(bytes_read, total_expected)`.
    pub fn record_wire_bytes(&mut self, len: usize) -> (u64, Option<u64>) {
        self.bytes_read += len as u64;
        (self.bytes_read, self.head.content_length)
    }

    /// Declared Content-Length, if any.
    #[must_use]
    pub fn total_expected(&self) -> Option<u64> {
        self.head.content_length
    }

    /// Wire bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Feeds one decompressed chunk.
    ///
    /// Detection only ever looks at the first non-empty chunk. In sink
    /// mode the chunk is not kept; the caller forwards it.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedCharset`] if a BOM or an embedded declaration
    /// names a charset the codec does not know.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), UnsupportedCharset> {
        if chunk.is_empty() {
            return Ok(());
        }

        if !self.first_chunk_seen {
            self.first_chunk_seen = true;
            self.inspect_first_chunk(chunk)?;
        }

        if self.mode != OutputMode::Sink {
            self.content.extend_from_slice(chunk);
        }
        Ok(())
    }

    fn inspect_first_chunk(&mut self, chunk: &[u8]) -> Result<(), UnsupportedCharset> {
        if self.binary && !self.metadata_only {
            return Ok(());
        }

        if !self.ignore_bom {
            if let Some(bom) = detect_bom(chunk) {
                debug!(charset = bom.charset, len = bom.len, "byte-order mark found");
                if !self.forced {
                    self.adopt(bom.charset.to_string())?;
                }
                self.bom_detected = true;
                self.remove_bom = !self.keep_bom;
            }
        }

        if self.autodetect {
            if let Some(declared) = sniff_embedded_encoding(chunk) {
                debug!(charset = %declared, "embedded encoding declaration found");
                self.adopt(normalize_charset(&declared))?;
            }
        }
        Ok(())
    }

    /// Pins `charset`, unless it is unknown.
    fn adopt(&mut self, charset: String) -> Result<(), UnsupportedCharset> {
        self.autodetect = false;

        if !self.codec.supports(&charset) {
            if self.metadata_only {
                warn!(%charset, "ignoring unknown charset for forwarded body");
                return Ok(());
            }
            return Err(UnsupportedCharset(charset));
        }
        self.charset = charset;
        Ok(())
    }

    /// Ends the stream: decodes the accumulated body and builds the
    /// response metadata.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedCharset`] if the codec rejects the final charset.
    pub fn finish(self) -> Result<(Decoded, ResponseInfo), UnsupportedCharset> {
        let mut bom_removed = false;

        let decoded = if self.mode == OutputMode::Sink {
            Decoded::Forwarded
        } else if self.binary {
            Decoded::Bytes(self.content)
        } else {
            let mut text = self.codec.decode(&self.content, &self.charset, false)?;
            if self.remove_bom && text.starts_with('\u{FEFF}') {
                text.remove(0);
                bom_removed = true;
            }
            Decoded::Text(text)
        };

        let charset = if self.binary && !self.metadata_only {
            BINARY_CHARSET.to_string()
        } else {
            self.charset
        };
        let content_encoding = if self.head.content_encoding.is_empty() {
            "identity".to_string()
        } else {
            self.head.content_encoding
        };

        let info = ResponseInfo {
            bom_detected: self.bom_detected,
            bom_removed,
            callback: None,
            charset,
            content_encoding,
            content_length: self.bytes_read,
            content_type: self.head.content_type,
            status: self.head.status,
        };
        Ok((decoded, info))
    }
}
