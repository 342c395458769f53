//! EBCDIC (code page 500, "EBCDIC-CP-BE") to ASCII translation.
//!
//! NJE text fields — node names, passwords, job names, message bodies — are
//! all EBCDIC on the wire. Translation is a pure byte-for-byte table lookup;
//! bytes with no ASCII equivalent decode to `?` (0x3F) rather than failing,
//! matching how mainframe-adjacent tooling treats untranslatable bytes.

/// EBCDIC space, used to pad 8-byte name fields.
pub const EBCDIC_SPACE: u8 = 0x40;

#[rustfmt::skip]
const EBCDIC_TO_ASCII: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x3F, 0x09, 0x3F, 0x7F, 0x3F, 0x3F, 0x3F, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x3F, 0x3F, 0x08, 0x3F, 0x18, 0x19, 0x3F, 0x3F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x0A, 0x17, 0x1B, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x05, 0x06, 0x07,
    0x3F, 0x3F, 0x16, 0x3F, 0x3F, 0x3F, 0x3F, 0x04, 0x3F, 0x3F, 0x3F, 0x3F, 0x14, 0x15, 0x3F, 0x1A,
    0x20, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x5B, 0x2E, 0x3C, 0x28, 0x2B, 0x21,
    0x26, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x5D, 0x24, 0x2A, 0x29, 0x3B, 0x5E,
    0x2D, 0x2F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0x3F, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x7C, 0x3F, 0x3F, 0x3F, 0x3F,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x5C, 0x3F, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F, 0x3F,
];

#[rustfmt::skip]
const ASCII_TO_EBCDIC: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x37, 0x2D, 0x2E, 0x2F, 0x16, 0x05, 0x25, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x3C, 0x3D, 0x32, 0x26, 0x18, 0x19, 0x3F, 0x27, 0x1C, 0x1D, 0x1E, 0x1F,
    0x40, 0x4F, 0x7F, 0x7B, 0x5B, 0x6C, 0x50, 0x7D, 0x4D, 0x5D, 0x5C, 0x4E, 0x6B, 0x60, 0x4B, 0x61,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0x7A, 0x5E, 0x4C, 0x7E, 0x6E, 0x6F,
    0x7C, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6,
    0xD7, 0xD8, 0xD9, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0x4A, 0xE0, 0x5A, 0x5F, 0x6D,
    0x79, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xC0, 0xBB, 0xD0, 0xA1, 0x07,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
    0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F, 0x6F,
];

/// Translate a single EBCDIC byte to ASCII.
#[must_use]
pub fn ebcdic_byte_to_ascii(b: u8) -> u8 {
    EBCDIC_TO_ASCII[b as usize]
}

/// Translate a single ASCII byte to EBCDIC.
#[must_use]
pub fn ascii_byte_to_ebcdic(b: u8) -> u8 {
    ASCII_TO_EBCDIC[b as usize]
}

/// Translate an EBCDIC byte string to ASCII.
#[must_use]
pub fn ebcdic_to_ascii(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| ebcdic_byte_to_ascii(b)).collect()
}

/// Translate an ASCII byte string to EBCDIC.
#[must_use]
pub fn ascii_to_ebcdic(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&b| ascii_byte_to_ebcdic(b)).collect()
}

/// Uppercase, translate, and right-pad a name to exactly 8 EBCDIC bytes.
///
/// Names longer than 8 ASCII characters are truncated; this mirrors the
/// original's unchecked `ljust`/append behavior rather than rejecting long
/// names outright.
#[must_use]
pub fn pad_name(name: &str) -> [u8; 8] {
    let upper = name.to_ascii_uppercase();
    let mut out = [EBCDIC_SPACE; 8];
    for (slot, byte) in out.iter_mut().zip(upper.as_bytes().iter().take(8)) {
        *slot = ascii_byte_to_ebcdic(*byte);
    }
    out
}

/// Decode an 8-byte EBCDIC name field back to an uppercase ASCII `String`,
/// trailing spaces included (callers that want a trimmed name call
/// `.trim_end()` themselves, matching the original's explicit `.strip()`
/// calls at each use site rather than stripping unconditionally here).
#[must_use]
pub fn decode_name(field: &[u8; 8]) -> String {
    String::from_utf8_lossy(&ebcdic_to_ascii(field)).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn space_round_trips() {
        assert_eq!(ascii_byte_to_ebcdic(b' '), EBCDIC_SPACE);
        assert_eq!(ebcdic_byte_to_ascii(EBCDIC_SPACE), b' ');
    }

    #[test]
    fn digits_round_trip() {
        for d in b'0'..=b'9' {
            assert_eq!(ebcdic_byte_to_ascii(ascii_byte_to_ebcdic(d)), d);
        }
    }

    #[test]
    fn pad_name_uppercases_and_pads() {
        let padded = pad_name("zm15");
        assert_eq!(decode_name(&padded), "ZM15    ");
    }

    #[test]
    fn pad_name_truncates_long_input() {
        let padded = pad_name("muchtoolongname");
        assert_eq!(decode_name(&padded), "MUCHTOOL");
    }
}
