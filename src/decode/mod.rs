//! Charset resolution and decoding of response bodies.
//!
//! - [`classify`] - binary/text decision from the Content-Type
//! - [`bom`] - byte-order mark detection
//! - [`sniff`] - in-content encoding declarations
//! - [`codec`] - byte to text conversion for named charsets
//! - [`pipeline`] - the per-response state machine tying them together

pub mod bom;
pub mod classify;
pub mod codec;
pub mod pipeline;
pub mod sniff;

pub use bom::{Bom, detect_bom};
pub use classify::is_binary;
pub use codec::{Codec, StandardCodec, UnsupportedCharset};
pub use pipeline::{DecodeState, Decoded, ResponseHead};
pub use sniff::{MAX_EXAMINE, sniff_embedded_encoding};
