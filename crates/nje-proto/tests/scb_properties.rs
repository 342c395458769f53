//! Property-based tests for SCB compression.
//!
//! Verifies round-trip correctness across arbitrary byte strings, including
//! ones engineered to trigger every run kind (space runs, repeat runs,
//! literal runs) back to back.

use nje_proto::scb::{compress_segment, decompress_segment};
use proptest::prelude::*;

proptest! {
    /// Any input up to the 253-byte segment budget compresses and
    /// decompresses back to the original bytes with nothing left over.
    #[test]
    fn prop_compress_decompress_round_trips(bytes in prop::collection::vec(any::<u8>(), 0..253)) {
        let (segment, remaining) = compress_segment(&bytes);
        prop_assert_eq!(remaining, 0);
        let (decompressed, consumed) = decompress_segment(&segment).unwrap();
        prop_assert_eq!(consumed, segment.len());
        prop_assert_eq!(decompressed, bytes);
    }

    /// Input longer than 253 bytes leaves a well-defined remainder that, once
    /// fed through another segment, reconstructs the full original buffer.
    #[test]
    fn prop_oversized_input_continues_across_segments(bytes in prop::collection::vec(any::<u8>(), 253..600)) {
        let mut decoded = Vec::new();
        let mut remaining = bytes.as_slice();
        loop {
            let (segment, left) = compress_segment(remaining);
            let (chunk, consumed) = decompress_segment(&segment).unwrap();
            prop_assert_eq!(consumed, segment.len());
            decoded.extend_from_slice(&chunk);
            let consumed_input = remaining.len() - left;
            remaining = &remaining[consumed_input..];
            if left == 0 {
                break;
            }
        }
        prop_assert_eq!(decoded, bytes);
    }
}
