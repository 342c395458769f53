//! Fixed-layout header/trailer sections carried inside SYSIN/SYSOUT and NMR
//! records: the Job Header (NJH), Job Trailer (NJT), Data-Set Header (NDH),
//! and the Network Message Record (NMR).
//!
//! Unlike the TTB/TTR framing layer these sections mix big-endian integers,
//! EBCDIC text, and bit flags at irregular offsets, and some are followed by
//! a TLV sub-section chain — that's a poor fit for a `zerocopy` `#[repr(C)]`
//! cast, so they're decoded field-by-field the way the original client does,
//! with `nje_proto::ebcdic` doing the text translation.

pub mod ndh;
pub mod njh;
pub mod njt;
pub mod nmr;

pub use ndh::DatasetHeader;
pub use njh::JobHeader;
pub use njt::JobTrailer;
pub use nmr::{NmrBody, NmrMessage, NmrOutContext, NmrTypeFlags};

use crate::errors::{ProtoError, Result};

/// Read a 2-byte length/type TLV sub-section header: `LEN(2) TYPE(1) MOD(1)`.
/// Returns `(total_len, kind, modifier)`; `total_len` includes this 4-byte
/// header.
pub(crate) fn read_subsection_header(data: &[u8]) -> Result<(usize, u8, u8)> {
    if data.len() < 4 {
        return Err(ProtoError::HeaderTooShort { section: "sub-section header", need: 4, have: data.len() });
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    Ok((len, data[2], data[3]))
}

/// Walk a chain of TLV sub-sections until `data` is exhausted, calling `f`
/// with each section's `(kind, modifier, body)`.
///
/// # Errors
///
/// Returns [`ProtoError::HeaderTooShort`] if a sub-section's declared length
/// runs past the end of `data`.
pub(crate) fn for_each_subsection<'a>(
    mut data: &'a [u8],
    mut f: impl FnMut(u8, u8, &'a [u8]) -> Result<()>,
) -> Result<()> {
    while data.len() >= 4 {
        let (len, kind, modifier) = read_subsection_header(data)?;
        if len < 4 || len > data.len() {
            return Err(ProtoError::HeaderTooShort { section: "sub-section body", need: len, have: data.len() });
        }
        f(kind, modifier, &data[4..len])?;
        data = &data[len..];
    }
    Ok(())
}

pub(crate) fn field_u8(d: &[u8], at: usize, section: &'static str) -> Result<u8> {
    d.get(at).copied().ok_or(ProtoError::HeaderTooShort { section, need: at + 1, have: d.len() })
}

pub(crate) fn field_i32(d: &[u8], at: usize, section: &'static str) -> Result<i32> {
    let bytes = d
        .get(at..at + 4)
        .ok_or(ProtoError::HeaderTooShort { section, need: at + 4, have: d.len() })?;
    // INVARIANT: `d.get(at..at + 4)` only returns Some for a 4-byte slice.
    #[allow(clippy::expect_used)]
    Ok(i32::from_be_bytes(bytes.try_into().expect("slice of len 4")))
}

pub(crate) fn field_name(d: &[u8], at: usize, section: &'static str) -> Result<String> {
    let slice = d
        .get(at..at + 8)
        .ok_or(ProtoError::HeaderTooShort { section, need: at + 8, have: d.len() })?;
    // INVARIANT: `d.get(at..at + 8)` only returns Some for an 8-byte slice.
    #[allow(clippy::expect_used)]
    let field: [u8; 8] = slice.try_into().expect("slice of len 8");
    Ok(crate::ebcdic::decode_name(&field))
}
