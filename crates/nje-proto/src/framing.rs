//! TTB/TTR block and record length framing.
//!
//! One TCP read may contain several TTB blocks; each TTB contains several
//! TTR records. Both are plain big-endian 16-bit length prefixes at a fixed
//! offset — no reason to zero-copy-cast these, they're two bytes read out of
//! a four/eight byte header.

use bytes::{BufMut, BytesMut};

use crate::errors::{ProtoError, Result};

/// Fixed TTB header size: two reserved bytes, 2-byte length, four reserved.
pub const TTB_HEADER_LEN: usize = 8;
/// Fixed TTB trailer: four zero bytes.
pub const TTB_TRAILER_LEN: usize = 4;
/// Fixed TTR header size: two reserved bytes, 2-byte length.
pub const TTR_HEADER_LEN: usize = 4;

/// Wrap `data` in a TTB block: `00 00 | len(data)+12 | 00 00 00 00 | data | 00 00 00 00`.
#[must_use]
pub fn make_ttb(data: &[u8]) -> BytesMut {
    let total = data.len() + TTB_HEADER_LEN + TTB_TRAILER_LEN;
    let mut out = BytesMut::with_capacity(total);
    out.put_u16(0);
    out.put_u16(total as u16);
    out.put_u32(0);
    out.put_slice(data);
    out.put_u32(0);
    out
}

/// Wrap `data` in a TTR record header: `00 00 | len(data) | data`.
#[must_use]
pub fn make_ttr(data: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(TTR_HEADER_LEN + data.len());
    out.put_u16(0);
    out.put_u16(data.len() as u16);
    out.put_slice(data);
    out
}

/// Read the total block length (including the 8-byte header and 4-byte
/// trailer) from the first 4 bytes of a TTB header.
pub fn read_ttb_len(buf: &[u8]) -> Result<usize> {
    if buf.len() < 4 {
        return Err(ProtoError::TruncatedBlock { claimed: 0, available: buf.len() });
    }
    Ok(u16::from_be_bytes([buf[2], buf[3]]) as usize)
}

/// Read the record length (payload only) from the first 4 bytes of a TTR
/// header.
pub fn read_ttr_len(buf: &[u8]) -> Result<usize> {
    if buf.len() < 4 {
        return Err(ProtoError::TruncatedRecord { claimed: 0, available: buf.len() });
    }
    Ok(u16::from_be_bytes([buf[2], buf[3]]) as usize)
}

/// Split `input` into the content of successive TTB blocks, stripping each
/// block's 8-byte header and 4-byte trailer. Used by the record layer before
/// it walks the TTR records inside each block.
///
/// # Errors
///
/// Returns [`ProtoError::TruncatedBlock`] if a block's declared length runs
/// past the end of `input`.
pub fn split_ttb_blocks(mut input: &[u8]) -> Result<Vec<&[u8]>> {
    let mut blocks = Vec::new();
    while !input.is_empty() {
        let total = read_ttb_len(input)?;
        if total < TTB_HEADER_LEN + TTB_TRAILER_LEN || total > input.len() {
            return Err(ProtoError::TruncatedBlock { claimed: total, available: input.len() });
        }
        let content_len = total - TTB_HEADER_LEN - TTB_TRAILER_LEN;
        let content = &input[TTB_HEADER_LEN..TTB_HEADER_LEN + content_len];
        blocks.push(content);
        input = &input[total..];
    }
    Ok(blocks)
}

/// Split one TTB block's content into the payloads of its successive TTR
/// records, stripping each TTR's 4-byte header.
///
/// # Errors
///
/// Returns [`ProtoError::TruncatedRecord`] if a record's declared length
/// runs past the end of `content`.
pub fn split_ttr_records(mut content: &[u8]) -> Result<Vec<&[u8]>> {
    let mut records = Vec::new();
    while !content.is_empty() {
        let len = read_ttr_len(content)?;
        if TTR_HEADER_LEN + len > content.len() {
            return Err(ProtoError::TruncatedRecord { claimed: len, available: content.len() });
        }
        records.push(&content[TTR_HEADER_LEN..TTR_HEADER_LEN + len]);
        content = &content[TTR_HEADER_LEN + len..];
    }
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ttb_round_trip_length() {
        let data = b"hello world";
        let ttb = make_ttb(data);
        assert_eq!(read_ttb_len(&ttb).unwrap(), data.len() + TTB_HEADER_LEN + TTB_TRAILER_LEN);
        assert_eq!(ttb.len(), data.len() + TTB_HEADER_LEN + TTB_TRAILER_LEN);
    }

    #[test]
    fn ttr_round_trip_length() {
        let data = b"abc";
        let ttr = make_ttr(data);
        assert_eq!(read_ttr_len(&ttr).unwrap(), data.len());
    }

    #[test]
    fn split_ttb_blocks_handles_multiple() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&make_ttb(b"one"));
        buf.extend_from_slice(&make_ttb(b"two"));
        let blocks = split_ttb_blocks(&buf).unwrap();
        assert_eq!(blocks, vec![b"one".as_slice(), b"two".as_slice()]);
    }

    #[test]
    fn split_ttb_blocks_rejects_truncation() {
        let mut buf = make_ttb(b"one").to_vec();
        buf.truncate(buf.len() - 2);
        assert!(split_ttb_blocks(&buf).is_err());
    }

    #[test]
    fn split_ttr_records_handles_multiple_in_one_block() {
        let mut content = Vec::new();
        content.extend_from_slice(&make_ttr(b"first"));
        content.extend_from_slice(&make_ttr(b"second"));
        let records = split_ttr_records(&content).unwrap();
        assert_eq!(records, vec![b"first".as_slice(), b"second".as_slice()]);
    }

    #[test]
    fn split_ttr_records_rejects_truncation() {
        let mut content = make_ttr(b"first").to_vec();
        content.truncate(content.len() - 1);
        assert!(split_ttr_records(&content).is_err());
    }
}
