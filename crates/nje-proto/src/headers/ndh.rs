//! Data-Set Header (NDH): the general section plus the security TLV
//! sub-section. Grounded in `dataset_headers`.

use super::{field_i32, field_name, field_u8, for_each_subsection};
use crate::errors::{ProtoError, Result};

const SECTION: &str = "NDH general";
const GENERAL_LEN: usize = 116;

/// NDHGFLG1 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetHeaderFlags {
    /// F1SP: SYSOUT spin.
    pub spin: bool,
    /// F1HD: held.
    pub held: bool,
    /// F1LG: large record.
    pub large_record: bool,
    /// F1OV: output verified.
    pub output_verified: bool,
}

fn decode_flags(byte: u8) -> DatasetHeaderFlags {
    DatasetHeaderFlags {
        spin: byte & 0x80 != 0,
        held: byte & 0x40 != 0,
        large_record: byte & 0x20 != 0,
        output_verified: byte & 0x10 != 0,
    }
}

/// Security sub-section (`0x8C`): the submitting user/group for this data
/// set, same shape as the Job Header's security section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHeaderSecurity {
    /// NDHTOUSR.
    pub to_user: String,
    /// NDHTOGRP.
    pub to_group: String,
}

/// Decoded Data-Set Header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHeader {
    /// NDHGNODE: origin node.
    pub origin_node: String,
    /// NDHGRMT: originating remote.
    pub remote: String,
    /// NDHGPROC: procedure step name.
    pub proc_step: String,
    /// NDHGSTEP: job step name.
    pub step: String,
    /// NDHGDD: DD name.
    pub dd_name: String,
    /// NDHGDSNO: data set number.
    pub dataset_number: u16,
    /// NDHGNREC: record count.
    pub record_count: i32,
    /// NDHGFLG1.
    pub flags: DatasetHeaderFlags,
    /// NDHGRCFM: record format code.
    pub record_format: u8,
    /// NDHGLREC: logical record length.
    pub lrecl: u16,
    /// NDHGFORM: form name.
    pub form_name: String,
    /// NDHGSEGN: segment number, used when a data set spans records.
    pub segment_number: i32,
    /// Security sub-section, if present.
    pub security: Option<DatasetHeaderSecurity>,
}

/// Decode a Data-Set Header.
///
/// # Errors
///
/// Returns [`ProtoError::HeaderTooShort`] if `data` is shorter than the
/// declared general-section length.
pub fn decode(data: &[u8]) -> Result<DatasetHeader> {
    if data.len() < GENERAL_LEN {
        return Err(ProtoError::HeaderTooShort { section: SECTION, need: GENERAL_LEN, have: data.len() });
    }

    let dataset_number = u16::from_be_bytes([data[44], data[45]]);
    let lrecl = u16::from_be_bytes([data[54], data[55]]);

    let mut header = DatasetHeader {
        origin_node: field_name(data, 4, SECTION)?,
        remote: field_name(data, 12, SECTION)?,
        proc_step: field_name(data, 20, SECTION)?,
        step: field_name(data, 28, SECTION)?,
        dd_name: field_name(data, 36, SECTION)?,
        dataset_number,
        record_count: field_i32(data, 48, SECTION)?,
        flags: decode_flags(field_u8(data, 52, SECTION)?),
        record_format: field_u8(data, 53, SECTION)?,
        lrecl,
        form_name: field_name(data, 60, SECTION)?,
        segment_number: field_i32(data, 112, SECTION)?,
        security: None,
    };

    for_each_subsection(&data[GENERAL_LEN..], |kind, _modifier, body| {
        if kind == 0x8C && body.len() >= 80 {
            header.security = Some(DatasetHeaderSecurity {
                to_user: field_name(body, 64, "NDH security")?,
                to_group: field_name(body, 72, "NDH security")?,
            });
        }
        Ok(())
    })?;

    Ok(header)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_truncated_general_section() {
        assert!(decode(&[0; 10]).is_err());
    }

    #[test]
    fn decodes_general_section_fields() {
        let mut data = vec![0u8; GENERAL_LEN];
        data[44] = 0x00;
        data[45] = 0x05; // dataset_number = 5
        data[54] = 0x00;
        data[55] = 0x50; // lrecl = 80
        let header = decode(&data).unwrap();
        assert_eq!(header.dataset_number, 5);
        assert_eq!(header.lrecl, 80);
        assert!(header.security.is_none());
    }
}
