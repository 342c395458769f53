//! Job Trailer (NJT): general section only — the original never observed
//! trailer sub-sections in practice, so none are decoded here. Grounded in
//! `job_footers`/`makeSYSIN_footer`.

use super::{field_i32, field_u8};
use crate::errors::{ProtoError, Result};

const SECTION: &str = "NJT general";
const GENERAL_LEN: usize = 52;

/// Decoded Job Trailer general section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTrailer {
    /// NJTGTYPE.
    pub section_type: u8,
    /// NJTGXCLS: output class override.
    pub exit_class: u8,
    /// NJTGSTRT: STCK start timestamp.
    pub start: [u8; 8],
    /// NJTGSTOP: STCK stop timestamp.
    pub stop: [u8; 8],
    /// NJTGALIN: actual line count.
    pub actual_lines: i32,
    /// NJTGACRD: actual card count.
    pub actual_cards: i32,
    /// NJTGIXPR: intended print pages.
    pub intended_print: u8,
    /// NJTGAXPR: actual print pages.
    pub actual_print: u8,
    /// NJTGIOPR: intended punch pages.
    pub intended_punch: u8,
    /// NJTGAOPR: actual punch pages.
    pub actual_punch: u8,
    /// NJTGCOMP: job completion code.
    pub completion_code: u8,
}

/// Decode a Job Trailer general section.
///
/// # Errors
///
/// Returns [`ProtoError::HeaderTooShort`] if `data` is shorter than 52 bytes.
pub fn decode(data: &[u8]) -> Result<JobTrailer> {
    if data.len() < GENERAL_LEN {
        return Err(ProtoError::HeaderTooShort { section: SECTION, need: GENERAL_LEN, have: data.len() });
    }
    // INVARIANT: `data.len() >= GENERAL_LEN` (52) was checked above, so both
    // 8-byte slices at offsets 8 and 16 are in bounds.
    #[allow(clippy::expect_used)]
    let start: [u8; 8] = data[8..16].try_into().expect("slice of len 8");
    #[allow(clippy::expect_used)]
    let stop: [u8; 8] = data[16..24].try_into().expect("slice of len 8");
    Ok(JobTrailer {
        section_type: field_u8(data, 2, SECTION)?,
        exit_class: field_u8(data, 5, SECTION)?,
        start,
        stop,
        actual_lines: field_i32(data, 28, SECTION)?,
        actual_cards: field_i32(data, 32, SECTION)?,
        intended_print: field_u8(data, 40, SECTION)?,
        actual_print: field_u8(data, 41, SECTION)?,
        intended_punch: field_u8(data, 42, SECTION)?,
        actual_punch: field_u8(data, 43, SECTION)?,
        completion_code: field_u8(data, 44, SECTION)?,
    })
}

/// Build the zero-filled Job Trailer skeleton used to close an outbound
/// SYSIN submission: `LEN(2)=0x0034 TYPE/MOD(2)=0 LENP(2)=0x0030 <46 zero
/// bytes>`, matching the original's `makeSYSIN_footer`.
#[must_use]
pub fn build_skeleton() -> Vec<u8> {
    let mut out = Vec::with_capacity(GENERAL_LEN);
    out.extend_from_slice(&[0x00, 0x34, 0x00, 0x00]);
    out.extend_from_slice(&[0x00, 0x30]);
    out.extend_from_slice(&[0x00; 46]);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn skeleton_decodes_as_all_zero_completion() {
        let trailer = decode(&build_skeleton()).unwrap();
        assert_eq!(trailer.completion_code, 0);
        assert_eq!(trailer.actual_lines, 0);
    }

    #[test]
    fn rejects_truncated_trailer() {
        assert!(decode(&[0; 10]).is_err());
    }
}
