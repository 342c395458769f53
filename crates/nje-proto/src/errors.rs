//! Error types for wire codec and record parsing.

use thiserror::Error;

/// Result alias used throughout `nje-proto`.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors produced while framing or parsing NJE wire structures.
///
/// These are all structural: they describe a malformed buffer, never a
/// network or session-level failure (those live in `nje-core`/`nje-client`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// A TTB block claimed a length longer than the bytes available.
    #[error("truncated TTB block: claimed {claimed} bytes, had {available}")]
    TruncatedBlock {
        /// Length the TTB header claimed.
        claimed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A TTR record claimed a length longer than the bytes available.
    #[error("truncated TTR record: claimed {claimed} bytes, had {available}")]
    TruncatedRecord {
        /// Length the TTR header claimed.
        claimed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A record that was supposed to carry a DLE-STX frame did not.
    #[error("malformed DLE-STX frame: expected 0x10 0x02, got {0:#04x} {1:#04x}")]
    MalformedFrame(u8, u8),

    /// An SCB run extended past the end of the segment without a terminator.
    #[error("SCB run extends past segment end")]
    ScbOverrun,

    /// A fixed-layout header section was shorter than its declared layout.
    #[error("header section {section} too short: need {need} bytes, have {have}")]
    HeaderTooShort {
        /// Name of the section being decoded (e.g. "NJH general").
        section: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    /// An OPEN control record was not exactly 33 bytes.
    #[error("OPEN control record must be 33 bytes, got {0}")]
    BadOpenRecordLength(usize),
}
