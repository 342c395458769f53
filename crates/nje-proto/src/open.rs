//! The OPEN control record: the one frame in the protocol not wrapped in
//! TTB/TTR/DLE-STX framing.
//!
//! Layout: `TYPE(8 ASCII) RHOST(8 EBCDIC) RIP(4) OHOST(8 EBCDIC) OIP(4) R(1)`,
//! exactly 33 bytes. `TYPE` stays plain ASCII ("OPEN"/"ACK "/"NAK ") since
//! it is matched against literal strings rather than decoded as a name
//! field.

use crate::ebcdic::{self, pad_name};
use crate::errors::{ProtoError, Result};

/// Fixed length of an OPEN control record on the wire.
pub const OPEN_RECORD_LEN: usize = 33;

/// A parsed OPEN control record (request or reply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenControl {
    /// 8-byte ASCII type tag, e.g. `"OPEN    "`.
    pub record_type: String,
    /// Requesting host's 8-byte EBCDIC node name.
    pub rhost: [u8; 8],
    /// Requesting host's IPv4 address, network order.
    pub rip: [u8; 4],
    /// Opening host's 8-byte EBCDIC node name.
    pub ohost: [u8; 8],
    /// Opening host's IPv4 address, network order.
    pub oip: [u8; 4],
    /// Response code: 0 on success, 1-4 name specific rejections.
    pub r: u8,
}

impl OpenControl {
    /// Build the initial OPEN request: `R` is always 0 on the way out.
    #[must_use]
    pub fn request(local_name: &str, local_ip: [u8; 4], remote_name: &str, remote_ip: [u8; 4]) -> Self {
        Self {
            record_type: "OPEN    ".to_string(),
            rhost: pad_name(remote_name),
            rip: remote_ip,
            ohost: pad_name(local_name),
            oip: local_ip,
            r: 0,
        }
    }

    /// Serialize to the exact 33-byte wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; OPEN_RECORD_LEN] {
        let mut out = [0u8; OPEN_RECORD_LEN];
        let type_bytes = self.record_type.as_bytes();
        let copy_len = type_bytes.len().min(8);
        out[..copy_len].copy_from_slice(&type_bytes[..copy_len]);
        out[8..16].copy_from_slice(&self.rhost);
        out[16..20].copy_from_slice(&self.rip);
        out[20..28].copy_from_slice(&self.ohost);
        out[28..32].copy_from_slice(&self.oip);
        out[32] = self.r;
        out
    }

    /// Decode an un-padded ASCII `TYPE` field, trimmed of trailing spaces.
    #[must_use]
    pub fn record_type_trimmed(&self) -> &str {
        self.record_type.trim_end()
    }

    /// Decode `rhost` to an uppercase ASCII string.
    #[must_use]
    pub fn rhost_name(&self) -> String {
        ebcdic::decode_name(&self.rhost)
    }

    /// Decode `ohost` to an uppercase ASCII string.
    #[must_use]
    pub fn ohost_name(&self) -> String {
        ebcdic::decode_name(&self.ohost)
    }
}

/// Parse a 33-byte OPEN control record.
///
/// # Errors
///
/// Returns [`ProtoError::BadOpenRecordLength`] if `data` is not exactly
/// [`OPEN_RECORD_LEN`] bytes.
pub fn parse(data: &[u8]) -> Result<OpenControl> {
    if data.len() != OPEN_RECORD_LEN {
        return Err(ProtoError::BadOpenRecordLength(data.len()));
    }
    let record_type = String::from_utf8_lossy(&data[0..8]).into_owned();
    let mut rhost = [0u8; 8];
    rhost.copy_from_slice(&data[8..16]);
    let mut rip = [0u8; 4];
    rip.copy_from_slice(&data[16..20]);
    let mut ohost = [0u8; 8];
    ohost.copy_from_slice(&data[20..28]);
    let mut oip = [0u8; 4];
    oip.copy_from_slice(&data[28..32]);
    let r = data[32];

    Ok(OpenControl { record_type, rhost, rip, ohost, oip, r })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn request_encodes_to_exactly_33_bytes() {
        let open = OpenControl::request("CLASS", [127, 0, 0, 1], "ZM15", [10, 0, 0, 2]);
        let encoded = open.encode();
        assert_eq!(encoded.len(), OPEN_RECORD_LEN);
        assert_eq!(open.r, 0);
    }

    #[test]
    fn encode_then_parse_round_trips_names_and_addresses() {
        let open = OpenControl::request("CLASS", [127, 0, 0, 1], "ZM15", [10, 0, 0, 2]);
        let encoded = open.encode();
        let parsed = parse(&encoded).unwrap();
        assert_eq!(parsed.rhost_name(), "ZM15    ");
        assert_eq!(parsed.ohost_name(), "CLASS   ");
        assert_eq!(parsed.rip, [10, 0, 0, 2]);
        assert_eq!(parsed.oip, [127, 0, 0, 1]);
    }

    #[test]
    fn reply_with_rejection_code_round_trips() {
        let mut open = OpenControl::request("CLASS", [127, 0, 0, 1], "ZM15", [10, 0, 0, 2]);
        open.record_type = "ACK     ".to_string();
        open.r = 4;
        let parsed = parse(&open.encode()).unwrap();
        assert_eq!(parsed.record_type_trimmed(), "ACK");
        assert_eq!(parsed.r, 4);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(parse(&[0u8; 32]).is_err());
        assert!(parse(&[0u8; 34]).is_err());
    }
}
