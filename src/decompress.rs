//! Content-Encoding inflation applied ahead of charset detection.
//!
//! The stage is driven chunk by chunk: every wire chunk goes through
//! [`Inflater::push`] and whatever plain bytes come out are handed to the
//! decode pipeline. [`Inflater::finish`] flushes the tail and fails on a
//! truncated or corrupted stream.

use std::io::{self, Write};

use flate2::write::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};

/// Output buffer headroom reserved before each raw inflate step.
const INFLATE_CHUNK: usize = 32 * 1024;

/// Internal buffer size for the brotli writer.
const BROTLI_BUFFER: usize = 4096;

/// A content coding this crate knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    /// No transform.
    Identity,
    /// `gzip` / `x-gzip`.
    Gzip,
    /// `deflate`, zlib-wrapped or raw.
    Deflate,
    /// `br`.
    Brotli,
}

impl ContentCoding {
    /// Parses a Content-Encoding header value. Returns `None` for anything unknown.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Some(Self::Identity),
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            "br" => Some(Self::Brotli),
            _ => None,
        }
    }

    /// Token used in headers and response metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Brotli => "br",
        }
    }
}

/// Which codings the decompression stage may use.
///
/// Decided once when the client is built and passed in as configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedCodings {
    /// Accept and inflate `gzip`.
    pub gzip: bool,
    /// Accept and inflate `deflate`.
    pub deflate: bool,
    /// Accept and inflate `br`.
    pub brotli: bool,
}

impl Default for SupportedCodings {
    fn default() -> Self {
        Self {
            gzip: true,
            deflate: true,
            brotli: true,
        }
    }
}

impl SupportedCodings {
    /// No compression support at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            gzip: false,
            deflate: false,
            brotli: false,
        }
    }

    /// Parses a comma-separated list such as `gzip, br`.
    ///
    /// Returns `None` if any entry is not a known compression coding.
    #[must_use]
    pub fn from_list(list: &str) -> Option<Self> {
        let mut codings = Self::none();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match ContentCoding::parse(token)? {
                ContentCoding::Gzip => codings.gzip = true,
                ContentCoding::Deflate => codings.deflate = true,
                ContentCoding::Brotli => codings.brotli = true,
                ContentCoding::Identity => {}
            }
        }
        Some(codings)
    }

    /// Returns true if responses coded with `coding` can be inflated.
    #[must_use]
    pub fn accepts(&self, coding: ContentCoding) -> bool {
        match coding {
            ContentCoding::Identity => true,
            ContentCoding::Gzip => self.gzip,
            ContentCoding::Deflate => self.deflate,
            ContentCoding::Brotli => self.brotli,
        }
    }

    /// Default `Accept-Encoding` value, or `None` when nothing is supported.
    #[must_use]
    pub fn accept_encoding(&self) -> Option<String> {
        let tokens: Vec<&str> = [
            (self.gzip, "gzip"),
            (self.deflate, "deflate"),
            (self.brotli, "br"),
        ]
        .into_iter()
        .filter_map(|(enabled, token)| enabled.then_some(token))
        .collect();
        (!tokens.is_empty()).then(|| tokens.join(", "))
    }
}

/// Incremental inflater for one response body.
pub struct Inflater {
    coding: ContentCoding,
    saw_input: bool,
    state: State,
}

enum State {
    Passthrough,
    Gzip(GzDecoder<Vec<u8>>),
    Flate(FlateStream),
    Brotli(Option<Box<brotli::DecompressorWriter<Vec<u8>>>>),
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("coding", &self.coding)
            .field("saw_input", &self.saw_input)
            .finish_non_exhaustive()
    }
}

impl Inflater {
    /// Creates an inflater for `coding`.
    #[must_use]
    pub fn new(coding: ContentCoding) -> Self {
        let state = match coding {
            ContentCoding::Identity => State::Passthrough,
            ContentCoding::Gzip => State::Gzip(GzDecoder::new(Vec::new())),
            ContentCoding::Deflate => State::Flate(FlateStream::default()),
            ContentCoding::Brotli => State::Brotli(Some(Box::new(
                brotli::DecompressorWriter::new(Vec::new(), BROTLI_BUFFER),
            ))),
        };
        Self {
            coding,
            saw_input: false,
            state,
        }
    }

    /// The coding being undone.
    #[must_use]
    pub fn coding(&self) -> ContentCoding {
        self.coding
    }

    /// Feeds one wire chunk and returns the plain bytes it produced.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidData` error if the stream is corrupt.
    pub fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        self.saw_input = true;

        match &mut self.state {
            State::Passthrough => Ok(chunk.to_vec()),
            State::Gzip(decoder) => {
                decoder.write_all(chunk)?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            State::Flate(stream) => stream.push(chunk),
            State::Brotli(writer) => {
                let writer = writer.as_mut().ok_or_else(finished_error)?;
                writer.write_all(chunk)?;
                Ok(std::mem::take(writer.get_mut()))
            }
        }
    }

    /// Flushes the remaining plain bytes once the wire stream has ended.
    ///
    /// An empty body is accepted for every coding.
    ///
    /// # Errors
    ///
    /// Returns an error if the compressed stream is truncated or its
    /// checksum does not match.
    pub fn finish(&mut self) -> io::Result<Vec<u8>> {
        if !self.saw_input {
            return Ok(Vec::new());
        }

        match &mut self.state {
            State::Passthrough => Ok(Vec::new()),
            State::Gzip(decoder) => {
                decoder.try_finish()?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            State::Flate(stream) => stream.finish(),
            State::Brotli(writer) => {
                let writer = writer.take().ok_or_else(finished_error)?;
                writer.into_inner().map_err(|_| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "truncated brotli stream")
                })
            }
        }
    }
}

fn finished_error() -> io::Error {
    io::Error::other("inflater already finished")
}

/// `deflate` body: zlib-wrapped per RFC 9110, but raw deflate is common
/// enough in the wild that the header decides which one to run.
#[derive(Default)]
struct FlateStream {
    pending: Vec<u8>,
    inflate: Option<Decompress>,
    ended: bool,
}

impl FlateStream {
    fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        if self.inflate.is_some() {
            return self.run(chunk);
        }

        self.pending.extend_from_slice(chunk);
        if self.pending.len() < 2 {
            return Ok(Vec::new());
        }
        self.start()
    }

    fn finish(&mut self) -> io::Result<Vec<u8>> {
        // Drains output still held by the decompressor.
        let out = if self.inflate.is_none() {
            self.start()?
        } else {
            self.run(&[])?
        };

        if !self.ended {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended prematurely",
            ));
        }
        Ok(out)
    }

    fn start(&mut self) -> io::Result<Vec<u8>> {
        let pending = std::mem::take(&mut self.pending);
        self.inflate = Some(Decompress::new(has_zlib_header(&pending)));
        self.run(&pending)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run(&mut self, mut input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let Some(inflate) = self.inflate.as_mut() else {
            return Ok(out);
        };
        if self.ended {
            return Ok(out);
        }

        loop {
            out.reserve(INFLATE_CHUNK);
            let before_in = inflate.total_in();
            let before_out = inflate.total_out();
            let status = inflate
                .decompress_vec(input, &mut out, FlushDecompress::None)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (inflate.total_in() - before_in) as usize;
            let produced = inflate.total_out() - before_out;
            input = &input[consumed..];

            if status == Status::StreamEnd {
                self.ended = true;
                break;
            }
            let stalled = consumed == 0 && produced == 0;
            let drained = input.is_empty() && out.len() < out.capacity();
            if stalled || drained {
                break;
            }
        }
        Ok(out)
    }
}

fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}
