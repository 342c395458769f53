//! SYSIN/SYSOUT record classification and decoding.
//!
//! SYSIN records classify solely by SRCB high nibble. SYSOUT is two-tier:
//! `SRCB & 0xC0 == 0xC0` names a control section (header/trailer), while
//! `SRCB & 0x8F == 0x80` names a data record and folds carriage control into
//! the rest of the upper nibble. Grounded directly in `process_SYSIN`/
//! `process_SYSOUT` since spec.md's bit description is an approximation of
//! this two-tier scheme.

use nje_proto::headers::{ndh, njh, njt};
use nje_proto::{DatasetHeader, JobHeader, JobTrailer, ebcdic};

use crate::error::SessionError;

/// Carriage control named by a SYSOUT data record's SRCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarriageControl {
    /// No carriage control.
    None,
    /// Machine carriage control.
    Machine,
    /// ASA carriage control: the decoded text's first character is the
    /// control character, kept in place rather than split out.
    Asa,
    /// CPDS page mode.
    PageMode,
}

/// A decoded SYSIN or SYSOUT stream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// A job header section.
    JobHeader(JobHeader),
    /// A data-set header section.
    DatasetHeader(DatasetHeader),
    /// A job trailer section.
    JobTrailer(JobTrailer),
    /// A plain text line, already translated to ASCII.
    Line {
        /// Carriage control named by the SRCB, for SYSOUT data records.
        carriage_control: Option<CarriageControl>,
        /// The text content, length-prefix already stripped.
        text: String,
    },
}

fn decode_length_prefixed_line(data: &[u8]) -> String {
    let len = *data.first().unwrap_or(&0) as usize;
    let body = data.get(1..1 + len).unwrap_or(data.get(1..).unwrap_or(&[]));
    String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(body)).into_owned()
}

/// Decode one SYSIN tuple's payload. SRCB classifies by high nibble alone:
/// `0x80` standard record, `0xC0` job header, `0xE0` data-set header, `0xD0`
/// job trailer.
///
/// # Errors
///
/// Propagates decode errors from the underlying header codecs, or
/// [`SessionError::FramingError`] for an unrecognized SRCB class.
pub fn decode_sysin(srcb: u8, data: &[u8]) -> Result<StreamRecord, SessionError> {
    match srcb & 0xF0 {
        0x80 => Ok(StreamRecord::Line { carriage_control: None, text: decode_length_prefixed_line(data) }),
        0xC0 => Ok(StreamRecord::JobHeader(njh::decode(data)?)),
        0xE0 => Ok(StreamRecord::DatasetHeader(ndh::decode(data)?)),
        0xD0 => Ok(StreamRecord::JobTrailer(njt::decode(data)?)),
        other => Err(SessionError::FramingError(format!("unrecognized SYSIN SRCB class {other:#04x}"))),
    }
}

/// Decode one SYSOUT tuple's payload.
///
/// First checks `SRCB & 0xC0 == 0xC0` for a control section (header or
/// trailer), then `SRCB & 0x8F == 0x80` for a data record whose upper nibble
/// also names carriage control.
///
/// # Errors
///
/// Propagates decode errors from the underlying header codecs, or
/// [`SessionError::FramingError`] if neither pattern matches.
pub fn decode_sysout(srcb: u8, data: &[u8]) -> Result<StreamRecord, SessionError> {
    if srcb & 0xC0 == 0xC0 {
        return match srcb & 0xF0 {
            0xC0 => Ok(StreamRecord::JobHeader(njh::decode(data)?)),
            0xE0 => Ok(StreamRecord::DatasetHeader(ndh::decode(data)?)),
            0xD0 => Ok(StreamRecord::JobTrailer(njt::decode(data)?)),
            other => Err(SessionError::FramingError(format!("unrecognized SYSOUT control SRCB {other:#04x}"))),
        };
    }

    if srcb & 0x8F == 0x80 {
        let cc = match srcb & 0xF0 {
            0x80 => CarriageControl::None,
            0x90 => CarriageControl::Machine,
            0xA0 => CarriageControl::Asa,
            _ => CarriageControl::PageMode,
        };
        let text = if cc == CarriageControl::PageMode {
            String::new()
        } else {
            decode_length_prefixed_line(data)
        };
        return Ok(StreamRecord::Line { carriage_control: Some(cc), text });
    }

    Err(SessionError::FramingError(format!("unrecognized SYSOUT SRCB {srcb:#04x}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sysin_classifies_by_high_nibble() {
        let line_data = {
            let body = ebcdic::ascii_to_ebcdic(b"HELLO");
            let mut d = vec![body.len() as u8];
            d.extend_from_slice(&body);
            d
        };
        let record = decode_sysin(0x80, &line_data).unwrap();
        assert_eq!(
            record,
            StreamRecord::Line { carriage_control: None, text: "HELLO".to_string() }
        );
    }

    #[test]
    fn sysin_rejects_unrecognized_class() {
        assert!(decode_sysin(0x00, &[]).is_err());
    }

    #[test]
    fn sysout_control_section_decodes_trailer() {
        let trailer = njt::build_skeleton();
        let record = decode_sysout(0xD0, &trailer).unwrap();
        assert!(matches!(record, StreamRecord::JobTrailer(_)));
    }

    #[test]
    fn sysout_data_record_names_carriage_control() {
        let body = ebcdic::ascii_to_ebcdic(b"X");
        let mut data = vec![body.len() as u8];
        data.extend_from_slice(&body);
        let record = decode_sysout(0x90, &data).unwrap();
        assert_eq!(
            record,
            StreamRecord::Line { carriage_control: Some(CarriageControl::Machine), text: "X".to_string() }
        );
    }

    #[test]
    fn sysout_asa_record_keeps_control_char_in_text() {
        let body = ebcdic::ascii_to_ebcdic(b"1PAGE HEADER");
        let mut data = vec![body.len() as u8];
        data.extend_from_slice(&body);
        let record = decode_sysout(0xA0, &data).unwrap();
        match record {
            StreamRecord::Line { carriage_control: Some(CarriageControl::Asa), text } => {
                assert!(text.starts_with('1'));
            },
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn sysout_rejects_unrecognized_srcb() {
        assert!(decode_sysout(0x01, &[]).is_err());
    }
}
