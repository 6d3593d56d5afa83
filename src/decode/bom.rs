//! Byte-order mark detection.

/// A byte-order mark found at the start of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bom {
    /// Canonical charset name the mark identifies.
    pub charset: &'static str,
    /// Length of the mark in bytes.
    pub len: usize,
}

impl Bom {
    const fn new(charset: &'static str, len: usize) -> Self {
        Self { charset, len }
    }
}

/// Checks the first bytes of `data` for a Unicode byte-order mark.
///
/// Patterns are tested in a fixed order; UTF-32LE must be tried before
/// UTF-16LE because its mark starts with the UTF-16LE mark.
#[must_use]
pub fn detect_bom(data: &[u8]) -> Option<Bom> {
    if data.len() < 2 {
        return None;
    }

    match data {
        [0x00, 0x00, 0xFE, 0xFF, ..] => Some(Bom::new("utf-32be", 4)),
        [0xFF, 0xFE, 0x00, 0x00, ..] => Some(Bom::new("utf-32le", 4)),
        [0xFE, 0xFF, ..] => Some(Bom::new("utf-16be", 2)),
        [0xFF, 0xFE, ..] => Some(Bom::new("utf-16le", 2)),
        [0xEF, 0xBB, 0xBF, ..] => Some(Bom::new("utf-8", 3)),
        [0x2B, 0x2F, 0x76, 0x2B | 0x2F | 0x38 | 0x39, ..] => Some(Bom::new("utf-7", 4)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_every_mark_with_its_length() {
        let cases: &[(&[u8], &str, usize)] = &[
            (&[0x00, 0x00, 0xFE, 0xFF, 0x00], "utf-32be", 4),
            (&[0xFF, 0xFE, 0x00, 0x00, 0x41], "utf-32le", 4),
            (&[0xFE, 0xFF, 0x00, 0x41], "utf-16be", 2),
            (&[0xFF, 0xFE, 0x41, 0x00], "utf-16le", 2),
            (&[0xEF, 0xBB, 0xBF, b'A'], "utf-8", 3),
            (b"+/v8-", "utf-7", 4),
            (b"+/v9", "utf-7", 4),
            (b"+/v+", "utf-7", 4),
            (b"+/v/", "utf-7", 4),
        ];

        for (data, charset, len) in cases {
            assert_eq!(
                detect_bom(data),
                Some(Bom::new(charset, *len)),
                "input {data:02x?}"
            );
        }
    }

    #[test]
    fn test_bare_utf16le_mark_is_not_utf32() {
        assert_eq!(detect_bom(&[0xFF, 0xFE]), Some(Bom::new("utf-16le", 2)));
        assert_eq!(
            detect_bom(&[0xFF, 0xFE, 0x00, 0x41]),
            Some(Bom::new("utf-16le", 2))
        );
    }

    #[test]
    fn test_short_or_plain_input_has_no_mark() {
        assert_eq!(detect_bom(&[]), None);
        assert_eq!(detect_bom(&[0xFF]), None);
        assert_eq!(detect_bom(&[0xEF, 0xBB]), None);
        assert_eq!(detect_bom(b"+/v"), None);
        assert_eq!(detect_bom(b"+/vA"), None);
        assert_eq!(detect_bom(b"<html>"), None);
        assert_eq!(detect_bom(&[0x00, 0x00, 0xFF, 0xFE]), None);
    }
}
