//! String Control Byte (SCB) run-length compression.
//!
//! Three run kinds, tried in priority order at each position: a space run
//! (`0x80|n`, 1..=31 EBCDIC spaces), a repeat run (`0xA0|n` + one byte,
//! 2..=31 copies), and a literal run (`0xC0|n` + n bytes, 1..=63). A segment
//! is capped at 253 input bytes and terminated by `0x00`; callers that still
//! have input left issue a fresh `RCB SRCB` tuple and compress the
//! remainder (see `nje-proto::record`).

use crate::ebcdic::EBCDIC_SPACE;
use crate::errors::{ProtoError, Result};

const MAX_LITERAL: usize = 63;
const MAX_RUN: usize = 31;
const SEGMENT_BUDGET: usize = 253;

/// Compress up to 253 bytes of `input`. Returns the compressed segment
/// (including the trailing `0x00` terminator) and the number of input bytes
/// left uncompressed, i.e. bytes the caller must feed through a new
/// `RCB SRCB` tuple.
#[must_use]
pub fn compress_segment(input: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut pos = 0usize;
    let mut processed = 0usize;

    while pos < input.len() && processed < SEGMENT_BUDGET {
        if literal.len() == MAX_LITERAL {
            flush_literal(&mut out, &mut literal);
        }

        if pos + 1 < input.len() && input[pos] == EBCDIC_SPACE && input[pos + 1] == EBCDIC_SPACE {
            flush_literal(&mut out, &mut literal);
            let mut run = 1usize;
            while pos + run < input.len()
                && input[pos + run] == EBCDIC_SPACE
                && run < MAX_RUN
                && processed + run < SEGMENT_BUDGET
            {
                run += 1;
            }
            out.push(0x80 | run as u8);
            pos += run;
            processed += run;
        } else if pos + 2 < input.len() && input[pos] == input[pos + 1] && input[pos] == input[pos + 2]
        {
            flush_literal(&mut out, &mut literal);
            let byte = input[pos];
            let mut run = 2usize;
            while pos + run < input.len()
                && input[pos + run] == byte
                && run < MAX_RUN
                && processed + run < SEGMENT_BUDGET
            {
                run += 1;
            }
            out.push(0xA0 | run as u8);
            out.push(byte);
            pos += run;
            processed += run;
        } else {
            literal.push(input[pos]);
            pos += 1;
            processed += 1;
        }
    }
    flush_literal(&mut out, &mut literal);
    out.push(0x00);

    (out, input.len() - pos)
}

fn flush_literal(out: &mut Vec<u8>, literal: &mut Vec<u8>) {
    for chunk in literal.chunks(MAX_LITERAL) {
        out.push(0xC0 | chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    literal.clear();
}

/// Decompress a single SCB segment. Returns the decompressed bytes and the
/// number of input bytes consumed, including the terminating `0x00`.
///
/// # Errors
///
/// Returns [`ProtoError::ScbOverrun`] if a run's length byte or repeated
/// byte runs past the end of `data` without a `0x00` terminator.
pub fn decompress_segment(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut i = 0usize;

    loop {
        let scb = *data.get(i).ok_or(ProtoError::ScbOverrun)?;
        i += 1;

        match scb & 0xC0 {
            0x00 => break,
            0xC0 => {
                let n = (scb & 0x3F) as usize;
                let end = i + n;
                let chunk = data.get(i..end).ok_or(ProtoError::ScbOverrun)?;
                out.extend_from_slice(chunk);
                i = end;
            }
            0x80 => {
                if scb & 0xE0 == 0xA0 {
                    let n = (scb & 0x1F) as usize;
                    let byte = *data.get(i).ok_or(ProtoError::ScbOverrun)?;
                    i += 1;
                    out.extend(std::iter::repeat_n(byte, n));
                } else {
                    let n = (scb & 0x1F) as usize;
                    out.extend(std::iter::repeat_n(EBCDIC_SPACE, n));
                }
            }
            _ => return Err(ProtoError::ScbOverrun),
        }
    }

    Ok((out, i))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn spec_example_compresses_as_documented() {
        // 3 EBCDIC spaces, 3 'C1' bytes, one literal 'X' (EBCDIC 0xE7)
        let input = [0x40, 0x40, 0x40, 0xC1, 0xC1, 0xC1, 0xE7];
        let (segment, remaining) = compress_segment(&input);
        assert_eq!(remaining, 0);
        assert_eq!(segment, vec![0x83, 0xA3, 0xC1, 0xC1, 0xE7, 0x00]);
    }

    #[test]
    fn two_identical_non_space_bytes_stay_literal() {
        let input = [0xC1, 0xC1, b'Z'];
        let (segment, _) = compress_segment(&input);
        // No run of length >= 3, so this is a 3-byte literal.
        assert_eq!(segment, vec![0xC0 | 3, 0xC1, 0xC1, b'Z', 0x00]);
    }

    #[test]
    fn decompress_is_inverse_of_compress() {
        let input = b"THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG  1234567890";
        let (segment, remaining) = compress_segment(input);
        assert_eq!(remaining, 0);
        let (decompressed, consumed) = decompress_segment(&segment).unwrap();
        assert_eq!(consumed, segment.len());
        assert_eq!(decompressed, input);
    }

    #[test]
    fn long_run_caps_at_31() {
        let input = vec![b'Q'; 50];
        let (segment, remaining) = compress_segment(&input);
        assert_eq!(remaining, 50 - 31);
        assert_eq!(segment[0], 0xA0 | 31);
    }

    #[test]
    fn truncated_segment_is_an_error() {
        assert!(decompress_segment(&[0xC0 | 5, b'a', b'b']).is_err());
    }

    #[test]
    fn unrecognized_scb_high_bits_are_an_error_not_a_panic() {
        assert!(decompress_segment(&[0x40]).is_err());
    }
}
