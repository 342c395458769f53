//! Network Message Record (NMR): operator messages and commands.
//!
//! Fixed 30-byte header (`NMRFLAG NMRLEVEL/PRIO NMRTYPE NMRML NMRTONOD
//! NMRFMQUL NMROUT NMRFMNOD NMRTOQUL`) followed by `NMRML` bytes of EBCDIC
//! message text. `NMROUT`'s meaning depends on the routing flags in
//! `NMRFLAG`; see [`NmrOutContext`]. Grounded in `process_nmr`/`sendNMR`.

use crate::ebcdic::{self, EBCDIC_SPACE};
use crate::errors::{ProtoError, Result};

const SECTION: &str = "NMR";
const HEADER_LEN: usize = 30;

/// NMRFLAG bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NmrFlags {
    /// Bit 7: NMR carries a command rather than a message.
    pub is_command: bool,
    /// Bit 6: `NMROUT` carries a JES2 remote number.
    pub remote_in_out: bool,
    /// Bit 5: `NMROUT` carries a user id.
    pub user_in_out: bool,
    /// Bit 4: `NMROUT` carries UCMID console routing information.
    pub ucmid_in_out: bool,
    /// Bit 3: console is remote-authorized only.
    pub console_remote_only: bool,
    /// Bit 2: console not job-authorized.
    pub not_job_authorized: bool,
    /// Bit 1: console not device-authorized.
    pub not_device_authorized: bool,
    /// Bit 0: console not system-authorized.
    pub not_system_authorized: bool,
}

fn decode_flags(byte: u8) -> NmrFlags {
    NmrFlags {
        is_command: byte & 0x80 != 0,
        remote_in_out: byte & 0x40 != 0,
        user_in_out: byte & 0x20 != 0,
        ucmid_in_out: byte & 0x10 != 0,
        console_remote_only: byte & 0x08 != 0,
        not_job_authorized: byte & 0x04 != 0,
        not_device_authorized: byte & 0x02 != 0,
        not_system_authorized: byte & 0x01 != 0,
    }
}

/// NMRTYPE sub-bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NmrTypeFlags {
    /// NMRTYPED: DOM (delete operator message), not supported downstream.
    pub dom: bool,
    /// NMRTYPEF: `NMRMSG` is a formatted command.
    pub formatted_command: bool,
    /// NMRTYPET: `NMRMSG` is text only.
    pub text_only: bool,
    /// NMRTYPE4: `NMRMSG` leads with control info (timestamp/NMRECSID).
    pub has_control_info: bool,
}

fn decode_type_flags(byte: u8) -> NmrTypeFlags {
    NmrTypeFlags {
        dom: byte & 0x01 != 0,
        formatted_command: byte & 0x02 != 0,
        text_only: byte & 0x04 != 0,
        has_control_info: byte & 0x08 != 0,
    }
}

/// How `NMROUT` is interpreted, determined by the routing bits in
/// `NMRFLAG`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmrOutContext {
    /// No routing flag set: a logically routed console message.
    Routed {
        /// NMRDESC: MCS descriptor codes.
        descriptor: [u8; 2],
        /// NMRROUT: MCS console routing codes.
        routing: [u8; 2],
        /// NMRDOMID: MCS DOM id.
        dom_id: [u8; 4],
    },
    /// Only the UCMID flag set: an MCS console line.
    Ucmid {
        /// NMRUCM: MCS console id.
        console_id: u8,
        /// NMRUCMA: MCS console area.
        console_area: u8,
        /// NMRLINET: line position in a multi-line WTO (first/middle/last/only).
        line_type: i16,
    },
    /// Only the user-id flag set: a message routed to a specific TSO user.
    User {
        /// NMRUSER: receiving user id.
        user: String,
    },
    /// Only the remote flag set: a message routed to a remote workstation.
    Remote {
        /// NMRRMT: remote workstation name, e.g. `"R1      "`.
        remote: String,
    },
    /// More than one of the mutually-exclusive flags set, or an
    /// otherwise-unrecognized combination. Carries the raw bytes.
    Ambiguous([u8; 8]),
}

fn decode_nmrout(flags: &NmrFlags, raw: &[u8; 8]) -> NmrOutContext {
    match (flags.remote_in_out, flags.user_in_out, flags.ucmid_in_out) {
        (false, false, false) => NmrOutContext::Routed {
            descriptor: [raw[0], raw[1]],
            routing: [raw[2], raw[3]],
            dom_id: [raw[4], raw[5], raw[6], raw[7]],
        },
        (false, false, true) => NmrOutContext::Ucmid {
            console_id: raw[0],
            console_area: raw[1],
            line_type: i16::from_be_bytes([raw[2], raw[3]]),
        },
        (false, true, false) => {
            NmrOutContext::User { user: String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(raw)).into_owned() }
        }
        (true, false, false) => {
            NmrOutContext::Remote { remote: String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(raw)).into_owned() }
        }
        _ => NmrOutContext::Ambiguous(*raw),
    }
}

/// The decoded message/command body plus the context needed to interpret
/// its leading bytes (timestamp, control-sequence id, or raw formatted
/// command bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmrBody {
    /// An unformatted command or message; `text` excludes any leading
    /// control-info bytes recorded separately in [`NmrMessage`].
    Text(String),
    /// A formatted command (`NMRTYPEF` set): not further interpreted,
    /// matching the original client, which leaves this undecoded.
    FormattedCommand(Vec<u8>),
}

/// A fully decoded NMR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmrMessage {
    /// NMRFLAG bits.
    pub flags: NmrFlags,
    /// High nibble of byte 1: message priority level. Always 0x00 on
    /// outbound NMRs built by this client (see `nje-client`'s Open Question
    /// note on the ambiguous original NMRLEVEL handling).
    pub level: u8,
    /// Low nibble of byte 1: message priority.
    pub priority: u8,
    /// NMRTYPE sub-bits.
    pub type_flags: NmrTypeFlags,
    /// NMRTONOD: destination node name.
    pub to_node: String,
    /// NMRFMNOD: origin node name.
    pub from_node: String,
    /// NMRFMQUL: origin queue qualifier.
    pub from_qualifier: u8,
    /// NMRTOQUL: destination queue qualifier.
    pub to_qualifier: u8,
    /// Routing context decoded from `NMROUT`.
    pub out_context: NmrOutContext,
    /// Message/command body.
    pub body: NmrBody,
    /// Leading 8-byte timestamp, present for messages without NMRTYPET set.
    pub timestamp: Option<[u8; 8]>,
    /// NMRECSID control-sequence id, present when NMRTYPE4 is set.
    pub ecsid: Option<[u8; 8]>,
}

/// Decode a single NMR from its SCB-decompressed payload.
///
/// # Errors
///
/// Returns [`ProtoError::HeaderTooShort`] if `data` is shorter than the
/// fixed 30-byte header plus its declared message length.
pub fn decode(data: &[u8]) -> Result<NmrMessage> {
    if data.len() < HEADER_LEN {
        return Err(ProtoError::HeaderTooShort { section: SECTION, need: HEADER_LEN, have: data.len() });
    }

    let flags = decode_flags(data[0]);
    let level = data[1] & 0xF0;
    let priority = data[1] & 0x0F;
    let type_flags = decode_type_flags(data[2]);
    let msg_len = data[3] as usize;
    let to_node = field_text(data, 4, 8);
    let from_qualifier = data[12];
    // INVARIANT: `data.len() >= HEADER_LEN` (30) was checked above, so the
    // 8-byte slice at offset 13 is in bounds.
    #[allow(clippy::expect_used)]
    let out_raw: [u8; 8] = data[13..21].try_into().expect("slice of len 8");
    let from_node = field_text(data, 21, 8);
    let to_qualifier = data[29];
    let out_context = decode_nmrout(&flags, &out_raw);

    let body_bytes = data
        .get(HEADER_LEN..HEADER_LEN + msg_len)
        .ok_or(ProtoError::HeaderTooShort { section: SECTION, need: HEADER_LEN + msg_len, have: data.len() })?;

    let (body, timestamp, ecsid) = if flags.is_command {
        if type_flags.formatted_command {
            (NmrBody::FormattedCommand(body_bytes.to_vec()), None, None)
        } else {
            let text = String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(body_bytes)).into_owned();
            (NmrBody::Text(text), None, None)
        }
    } else {
        let text = String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(body_bytes)).into_owned();
        let (timestamp, ecsid) = match (type_flags.has_control_info, type_flags.text_only) {
            (false, false) => (body_bytes.get(0..8).and_then(|s| s.try_into().ok()), None),
            (true, false) => (
                body_bytes.get(0..8).and_then(|s| s.try_into().ok()),
                body_bytes.get(8..16).and_then(|s| s.try_into().ok()),
            ),
            (true, true) => (None, body_bytes.get(0..8).and_then(|s| s.try_into().ok())),
            (false, true) => (None, None),
        };
        (NmrBody::Text(text), timestamp, ecsid)
    };

    Ok(NmrMessage {
        flags,
        level,
        priority,
        type_flags,
        to_node,
        from_node,
        from_qualifier,
        to_qualifier,
        out_context,
        body,
        timestamp,
        ecsid,
    })
}

fn field_text(d: &[u8], at: usize, len: usize) -> String {
    String::from_utf8_lossy(&ebcdic::ebcdic_to_ascii(&d[at..at + len])).into_owned()
}

/// Build an outbound operator-command NMR (`NMRFLAG = 0x90`).
///
/// The original source sets `NMRLEVEL` to `0x77` then immediately
/// overwrites it to `0x00` before sending, for both commands and messages;
/// the intended level is genuinely ambiguous (see `DESIGN.md`). We preserve
/// the final on-the-wire value, `0x00`.
#[must_use]
pub fn build_command(command: &str, to_node: &str, from_node: &str) -> Vec<u8> {
    build(0x90, to_node, from_node, [EBCDIC_SPACE; 8], command)
}

/// Build an outbound console message NMR (`NMRFLAG = 0x10`).
#[must_use]
pub fn build_console_message(message: &str, to_node: &str, from_node: &str) -> Vec<u8> {
    build(0x10, to_node, from_node, [0x00; 8], message)
}

/// Build an outbound user-directed message NMR (`NMRFLAG = 0x20`), with
/// `user` padded into `NMROUT`.
#[must_use]
pub fn build_user_message(message: &str, user: &str, to_node: &str, from_node: &str) -> Vec<u8> {
    build(0x20, to_node, from_node, ebcdic::pad_name(user), message)
}

fn build(flag: u8, to_node: &str, from_node: &str, nmrout: [u8; 8], body: &str) -> Vec<u8> {
    let ebcdic_body = ebcdic::ascii_to_ebcdic(body.as_bytes());
    let mut out = Vec::with_capacity(HEADER_LEN + ebcdic_body.len());
    out.push(flag);
    out.push(0x00); // NMRLEVEL/PRIO: always 0x00 on the wire, see build_command's doc.
    out.push(0x00); // NMRTYPE: unformatted.
    out.push(ebcdic_body.len() as u8);
    out.extend_from_slice(&ebcdic::pad_name(to_node));
    out.push(0x00); // NMRFMQUL
    out.extend_from_slice(&nmrout);
    out.extend_from_slice(&ebcdic::pad_name(from_node));
    out.push(0x00); // NMRTOQUL
    out.extend_from_slice(&ebcdic_body);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_through_decode() {
        let raw = build_command("$DA", "HOSTA", "NODEB");
        let nmr = decode(&raw).unwrap();
        assert!(nmr.flags.is_command);
        assert_eq!(nmr.level, 0x00);
        assert_eq!(nmr.to_node.trim_end(), "HOSTA");
        assert_eq!(nmr.from_node.trim_end(), "NODEB");
        assert_eq!(nmr.body, NmrBody::Text("$DA".to_string()));
    }

    #[test]
    fn console_message_has_routed_out_context() {
        let raw = build_console_message("SYSTEM UP", "HOSTA", "NODEB");
        let nmr = decode(&raw).unwrap();
        assert!(!nmr.flags.is_command);
        assert!(matches!(nmr.out_context, NmrOutContext::Routed { .. }));
    }

    #[test]
    fn user_message_decodes_user_in_out_context() {
        let raw = build_user_message("HELLO", "BOB", "HOSTA", "NODEB");
        let nmr = decode(&raw).unwrap();
        assert!(matches!(nmr.flags, NmrFlags { user_in_out: true, .. }));
        match nmr.out_context {
            NmrOutContext::User { ref user } => assert_eq!(user.trim_end(), "BOB"),
            other => panic!("expected User context, got {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(decode(&[0; 10]).is_err());
    }
}
