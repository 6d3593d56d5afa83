//! Charset codec capability.
//!
//! The decode pipeline never converts bytes itself; it asks a [`Codec`]
//! whether a charset name is known and hands it the accumulated body.
//! [`StandardCodec`] covers the WHATWG code tables through `encoding_rs`,
//! plus UTF-32, UTF-7 and a few byte-rendering pseudo-charsets that
//! `encoding_rs` does not provide.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use encoding_rs::Encoding;
use thiserror::Error;

/// The codec does not know the requested charset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported charset: {0}")]
pub struct UnsupportedCharset(pub String);

/// Converts body bytes to text for a named charset.
pub trait Codec: Send + Sync {
    /// Returns true if `charset` names an encoding this codec can decode.
    fn supports(&self, charset: &str) -> bool;

    /// Decodes `bytes` as `charset`.
    ///
    /// A leading U+FEFF is kept unless `strip_bom` is set. Malformed
    /// sequences become U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedCharset`] if `charset` is unknown.
    fn decode(&self, bytes: &[u8], charset: &str, strip_bom: bool)
    -> Result<String, UnsupportedCharset>;
}

/// Default codec backed by `encoding_rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

#[derive(Debug, Clone, Copy)]
enum Resolved {
    Ascii,
    Latin1,
    Base64,
    Hex,
    Utf16,
    Utf32,
    Utf32Le,
    Utf32Be,
    Utf7,
    Table(&'static Encoding),
}

/// iconv-style names that are not WHATWG labels.
const ALIASES: &[(&str, &str)] = &[
    ("macroman", "macintosh"),
    ("mac-roman", "macintosh"),
    ("maccyrillic", "x-mac-cyrillic"),
    ("win1250", "windows-1250"),
    ("win1251", "windows-1251"),
    ("win1252", "windows-1252"),
    ("shiftjis", "shift_jis"),
    ("eucjp", "euc-jp"),
    ("euckr", "euc-kr"),
];

fn resolve(charset: &str) -> Option<Resolved> {
    let label = charset.trim().to_ascii_lowercase();

    let resolved = match label.as_str() {
        "ascii" => Resolved::Ascii,
        "binary" | "latin1" => Resolved::Latin1,
        "base64" => Resolved::Base64,
        "hex" => Resolved::Hex,
        "ucs2" | "ucs-2" | "utf16le" => Resolved::Table(encoding_rs::UTF_16LE),
        "utf16be" => Resolved::Table(encoding_rs::UTF_16BE),
        "utf16" | "utf-16" => Resolved::Utf16,
        "utf32" | "utf-32" => Resolved::Utf32,
        "utf32le" | "utf-32le" => Resolved::Utf32Le,
        "utf32be" | "utf-32be" => Resolved::Utf32Be,
        "utf7" | "utf-7" | "unicode-1-1-utf-7" => Resolved::Utf7,
        other => {
            let label = ALIASES
                .iter()
                .find(|(alias, _)| *alias == other)
                .map_or(other, |(_, target)| *target);
            let encoding = Encoding::for_label_no_replacement(label.as_bytes())?;
            Resolved::Table(encoding)
        }
    };
    Some(resolved)
}

impl Codec for StandardCodec {
    fn supports(&self, charset: &str) -> bool {
        resolve(charset).is_some()
    }

    fn decode(
        &self,
        bytes: &[u8],
        charset: &str,
        strip_bom: bool,
    ) -> Result<String, UnsupportedCharset> {
        let resolved = resolve(charset).ok_or_else(|| UnsupportedCharset(charset.to_string()))?;

        let text = match resolved {
            Resolved::Latin1 => return Ok(encoding_rs::mem::decode_latin1(bytes).into_owned()),
            Resolved::Base64 => return Ok(BASE64.encode(bytes)),
            Resolved::Hex => return Ok(bytes.iter().map(|b| format!("{b:02x}")).collect()),
            Resolved::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
            Resolved::Utf16 => utf16_byte_order(bytes)
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
            Resolved::Utf32 => decode_utf32(bytes, bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF])),
            Resolved::Utf32Le => decode_utf32(bytes, false),
            Resolved::Utf32Be => decode_utf32(bytes, true),
            Resolved::Utf7 => decode_utf7(bytes),
            Resolved::Table(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        };

        if strip_bom && text.starts_with('\u{FEFF}') {
            return Ok(text['\u{FEFF}'.len_utf8()..].to_string());
        }
        Ok(text)
    }
}

/// Byte order for unlabelled UTF-16: the BOM if present, otherwise
/// whichever order puts the zero byte of ASCII characters in the expected
/// place more often over the first 100 bytes. Ties go to little-endian.
fn utf16_byte_order(bytes: &[u8]) -> &'static Encoding {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return encoding_rs::UTF_16BE;
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return encoding_rs::UTF_16LE;
    }

    let (mut big, mut little) = (0_usize, 0_usize);
    for pair in bytes[..bytes.len().min(100)].chunks_exact(2) {
        match (pair[0], pair[1]) {
            (0, b) if b != 0 => big += 1,
            (b, 0) if b != 0 => little += 1,
            _ => {}
        }
    }
    if big > little {
        encoding_rs::UTF_16BE
    } else {
        encoding_rs::UTF_16LE
    }
}

fn decode_utf32(bytes: &[u8], big_endian: bool) -> String {
    let chunks = bytes.chunks_exact(4);
    let trailing = !chunks.remainder().is_empty();

    let mut text: String = chunks
        .map(|unit| {
            let raw = [unit[0], unit[1], unit[2], unit[3]];
            let value = if big_endian {
                u32::from_be_bytes(raw)
            } else {
                u32::from_le_bytes(raw)
            };
            char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();

    if trailing {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

fn modified_base64_value(byte: u8) -> Option<u32> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u32::from(value))
}

/// RFC 2152 decoding: direct characters pass through, `+...-` runs carry
/// modified-base64 UTF-16 code units, `+-` is a literal plus sign.
#[allow(clippy::cast_possible_truncation)]
fn decode_utf7(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        i += 1;

        if byte != b'+' {
            units.push(if byte.is_ascii() { u16::from(byte) } else { 0xFFFD });
            continue;
        }

        if bytes.get(i) == Some(&b'-') {
            units.push(u16::from(b'+'));
            i += 1;
            continue;
        }

        let mut bits: u32 = 0;
        let mut bit_count: u32 = 0;
        while let Some(value) = bytes.get(i).copied().and_then(modified_base64_value) {
            bits = (bits << 6) | value;
            bit_count += 6;
            if bit_count >= 16 {
                bit_count -= 16;
                units.push((bits >> bit_count) as u16);
            }
            bits &= (1 << bit_count) - 1;
            i += 1;
        }
        if bytes.get(i) == Some(&b'-') {
            i += 1;
        }
    }

    char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
