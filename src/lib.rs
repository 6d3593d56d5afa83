//! by-request: an HTTP client that decodes what it downloads.
//!
//! Responses are fetched as text, bytes, JSON or files. Text decoding works
//! out the character set from the `Content-Type` header, a byte-order mark or
//! an in-document declaration (`<meta charset>`, `<?xml encoding?>`,
//! `@charset`), after transparently inflating gzip, deflate or brotli bodies.
//!
//! # Architecture
//!
//! - [`client`] - Request orchestration and the caller-facing operations
//! - [`decode`] - Binary classification, BOM detection, charset sniffing and
//!   the streaming decode state
//! - [`decompress`] - Content-Encoding inflation
//! - [`transport`] - The HTTP exchange behind a trait
//! - [`request`] - Request options and response metadata
//! - [`destination`] - Output file resolution for downloads
//! - [`json`] - JSON and JSONP parsing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod decode;
pub mod decompress;
pub mod destination;
pub mod error;
pub mod json;
pub mod request;
pub mod transport;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use client::Client;
pub use config::ClientConfig;
pub use decode::{Codec, StandardCodec, UnsupportedCharset};
pub use decompress::{ContentCoding, SupportedCodings};
pub use destination::Destination;
pub use error::FetchError;
pub use request::{
    Body, FetchOptions, OutputMode, ProgressCallback, ResponseInfo, ResponseInfoCallback, Target,
};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
