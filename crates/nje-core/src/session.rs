//! Session layer state machine.
//!
//! Drives the NJE handshake (OPEN→SOH-ENQ→I/J/K/L signon records) and the
//! steady-state RCB dispatch loop. Uses the action pattern: methods take
//! time as input and return actions for the driver to execute, so the state
//! machine stays pure and testable without a real socket.
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect--> TCPUp --initiate--> OpenSent
//!   OpenSent --R=0--> SohSent --DLE ACK0--> IRecSent
//!   IRecSent --NCCIEVNT==0--> KRecSent --J--> SignedOn
//!   IRecSent --NCCIEVNT!=0--> SignedOn
//!   SignedOn --B-record/signoff--> Disconnected
//! ```

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use nje_proto::headers::nmr;
use nje_proto::record::{self, next_bcb};
use nje_proto::{NmrMessage, OpenControl, Record, ebcdic};

use crate::error::{SessionError, open_reject_reason};
use crate::stream::{self, StreamRecord};

/// Time allowed to complete the full OPEN/SOH/I/J/K/L handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// General NCCR record control byte.
const NCCR_RCB: u8 = 0xF0;
/// EBCDIC letter 'I': initial signon.
const NCCR_I: u8 = 0xC9;
/// EBCDIC letter 'K': reset signon.
const NCCR_K: u8 = 0xD2;
/// EBCDIC letter 'L': concurrence signon.
const NCCR_L: u8 = 0xD3;
/// EBCDIC letter 'B': signoff.
const NCCR_B: u8 = 0xC2;

/// DLE ACK0, sent by the peer after a successful SOH-ENQ.
const DLE_ACK0: [u8; 2] = [0x10, 0x70];

/// The session's current position in the handshake/dispatch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket established.
    Disconnected,
    /// Socket open, handshake not yet started.
    TcpUp,
    /// OPEN control record sent, waiting for the peer's reply.
    OpenSent,
    /// SOH-ENQ sent, waiting for DLE ACK0.
    SohSent,
    /// Initial signon (I-record) sent, waiting for the peer's J-record.
    IRecSent,
    /// Reset signon (K-record) sent after a zero NCCIEVNT, waiting for J again.
    KRecSent,
    /// Handshake complete; steady-state RCB dispatch is active.
    SignedOn,
}

/// Actions the session state machine asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send the raw 33-byte OPEN control record (not TTB/TTR/DLE-STX wrapped).
    SendOpen(OpenControl),
    /// Send bytes already framed (TTB-wrapped) for the socket.
    SendFrame(Vec<u8>),
    /// A decoded NMR (operator message or command) arrived.
    DeliverNmr(NmrMessage),
    /// A decoded SYSIN stream record arrived.
    DeliverSysin(StreamRecord),
    /// A decoded SYSOUT stream record arrived.
    DeliverSysout(StreamRecord),
    /// The peer granted permission to open the named stream.
    StreamPermissionGranted {
        /// The RCB of the stream that was granted.
        rcb: u8,
    },
    /// The peer denied or canceled the named stream.
    StreamPermissionDenied {
        /// The RCB of the stream that was denied.
        rcb: u8,
    },
    /// Close the socket; the session is done (clean signoff or fatal error).
    Close {
        /// Human-readable reason.
        reason: String,
    },
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout allowed for the full handshake.
    pub handshake_timeout: Duration,
    /// Local node name, 8 chars or fewer (RHOST/OHOST depending on role).
    pub local_name: String,
    /// Remote node name.
    pub remote_name: String,
    /// Local IPv4 address, network order.
    pub local_ip: [u8; 4],
    /// Remote IPv4 address, network order.
    pub remote_ip: [u8; 4],
    /// Local node number; defaults to 0x01 per spec.
    pub local_node: u8,
    /// Signon password, up to 8 bytes.
    pub password: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            local_name: String::new(),
            remote_name: String::new(),
            local_ip: [0, 0, 0, 0],
            remote_ip: [0, 0, 0, 0],
            local_node: 0x01,
            password: String::new(),
        }
    }
}

/// The NJE session handshake and steady-state dispatch state machine.
///
/// Pure state machine: no I/O, no sockets. Time is passed as a parameter to
/// methods that need it so tests can drive it with virtual clocks.
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: SessionState,
    config: SessionConfig,
    handshake_started: I,
    /// Outbound block sequence number, high bit always set.
    bcb: u8,
    /// Flow-control stream mask, set by the peer's J-record and echoed after.
    fcs: [u8; 2],
    /// Remote node number, discovered from the J-record's NCCIQUAL.
    remote_node: Option<u8>,
    signed_on: bool,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new session in [`SessionState::Disconnected`].
    pub fn new(now: I, config: SessionConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            config,
            handshake_started: now,
            bcb: 0x80,
            fcs: [0x8F, 0xCF],
            remote_node: None,
            signed_on: false,
        }
    }

    /// Construct a session already in [`SessionState::SignedOn`], bypassing
    /// the handshake entirely. Used by offline capture replay, where the
    /// recorded bytes begin mid-session and there is no OPEN/SOH exchange
    /// to drive.
    #[must_use]
    pub fn signed_on(now: I, config: SessionConfig) -> Self {
        let mut session = Self::new(now, config);
        session.state = SessionState::SignedOn;
        session.signed_on = true;
        session
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_signed_on(&self) -> bool {
        self.signed_on
    }

    /// Remote node number discovered during signon, if any.
    #[must_use]
    pub fn remote_node(&self) -> Option<u8> {
        self.remote_node
    }

    /// Current outbound BCB value.
    #[must_use]
    pub fn bcb(&self) -> u8 {
        self.bcb
    }

    fn advance_bcb(&mut self) -> u8 {
        let current = self.bcb;
        self.bcb = next_bcb(self.bcb);
        current
    }

    /// Mark the TCP socket as established (driver already connected).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::Disconnected`].
    pub fn mark_tcp_up(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(invalid_state(self.state, "mark_tcp_up"));
        }
        self.state = SessionState::TcpUp;
        Ok(())
    }

    /// Send the OPEN control record, beginning the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::TcpUp`].
    pub fn initiate(&mut self, now: I) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::TcpUp {
            return Err(invalid_state(self.state, "initiate"));
        }
        self.handshake_started = now;
        self.state = SessionState::OpenSent;

        let open = OpenControl::request(
            &self.config.local_name,
            self.config.local_ip,
            &self.config.remote_name,
            self.config.remote_ip,
        );
        Ok(vec![SessionAction::SendOpen(open)])
    }

    /// Process the peer's OPEN reply.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::OpenSent`], or
    /// [`SessionError::HandshakeRejected`] if `reply.r != 0`.
    pub fn handle_open_reply(&mut self, reply: &OpenControl) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::OpenSent {
            return Err(invalid_state(self.state, "handle_open_reply"));
        }
        if reply.r != 0 {
            self.state = SessionState::Disconnected;
            return Err(SessionError::HandshakeRejected { code: reply.r, reason: open_reject_reason(reply.r) });
        }

        self.state = SessionState::SohSent;
        let frame = crate::framed(&[0x01, 0x2D]);
        Ok(vec![SessionAction::SendFrame(frame)])
    }

    /// Process the peer's reply to SOH-ENQ. Must be exactly DLE ACK0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::SohSent`], or
    /// [`SessionError::UnexpectedRecord`] if the bytes are not DLE ACK0.
    pub fn handle_soh_reply(&mut self, data: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::SohSent {
            return Err(invalid_state(self.state, "handle_soh_reply"));
        }
        if data != DLE_ACK0 {
            return Err(SessionError::UnexpectedRecord {
                state: self.state,
                detail: format!("expected DLE ACK0, got {data:02x?}"),
            });
        }

        self.state = SessionState::IRecSent;
        let bcb = self.advance_bcb();
        let payload = build_i_record(&self.config);
        let raw = record::build_record(bcb, self.fcs, NCCR_RCB, NCCR_I, &payload, false);
        Ok(vec![SessionAction::SendFrame(crate::framed(&raw))])
    }

    /// Process a J-record (response signon), deciding between reset (K) and
    /// concurrence (L) based on NCCIEVNT.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not in [`SessionState::IRecSent`]
    /// or [`SessionState::KRecSent`], or [`SessionError::FramingError`] if the
    /// J-record is too short to parse.
    pub fn handle_j_record(&mut self, data: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        if !matches!(self.state, SessionState::IRecSent | SessionState::KRecSent) {
            return Err(invalid_state(self.state, "handle_j_record"));
        }
        if data.len() < 14 {
            return Err(SessionError::FramingError(format!("J-record too short: {} bytes", data.len())));
        }

        let nccqual = data[9];
        let nccievnt = &data[10..14];
        self.remote_node = Some(nccqual);

        if nccievnt == [0, 0, 0, 0] {
            self.state = SessionState::KRecSent;
            let bcb = self.advance_bcb();
            let reset = [0x09, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0xC8, 0x00, 0x00, 0x00, 0x00];
            let raw = record::build_record(bcb, self.fcs, NCCR_RCB, NCCR_K, &reset, false);
            Ok(vec![SessionAction::SendFrame(crate::framed(&raw))])
        } else {
            self.state = SessionState::SignedOn;
            self.signed_on = true;
            let bcb = self.advance_bcb();
            let mut con = vec![0x09];
            con.extend_from_slice(nccievnt);
            con.extend_from_slice(&[0x00, 0xC8]);
            let raw = record::build_record(bcb, self.fcs, NCCR_RCB, NCCR_L, &con, false);
            Ok(vec![SessionAction::SendFrame(crate::framed(&raw))])
        }
    }

    /// Handle a heartbeat: an inbound record whose body was only `DLE STX
    /// BCB FCS` (6 bytes). Replies with an empty heartbeat and advances BCB.
    pub fn handle_heartbeat(&mut self) -> SessionAction {
        let bcb = self.advance_bcb();
        SessionAction::SendFrame(crate::framed(&record::build_heartbeat(bcb, self.fcs)))
    }

    /// Build and frame a single outbound steady-state record, advancing the
    /// BCB. Used by the command/message/JCL submission paths once signed on.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::SignedOn`].
    pub fn send_record(&mut self, rcb: u8, srcb: u8, data: &[u8], compress: bool) -> Result<SessionAction, SessionError> {
        if self.state != SessionState::SignedOn {
            return Err(invalid_state(self.state, "send_record"));
        }
        let bcb = self.advance_bcb();
        let raw = record::build_record(bcb, self.fcs, rcb, srcb, data, compress);
        Ok(SessionAction::SendFrame(crate::framed(&raw)))
    }

    /// Same as [`Session::send_record`] but batches several `(rcb, srcb,
    /// data)` tuples into one DLE-STX record, advancing the BCB once. Used
    /// to send a Job Header, JCL lines, and Job Trailer as one transmission.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::SignedOn`].
    pub fn send_record_multi(&mut self, tuples: &[(u8, u8, &[u8])], compress: bool) -> Result<SessionAction, SessionError> {
        if self.state != SessionState::SignedOn {
            return Err(invalid_state(self.state, "send_record_multi"));
        }
        let bcb = self.advance_bcb();
        let raw = record::build_record_multi(bcb, self.fcs, tuples, compress);
        Ok(SessionAction::SendFrame(crate::framed(&raw)))
    }

    /// Dispatch a fully decoded steady-state record per its RCB tuples.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if not [`SessionState::SignedOn`],
    /// or propagates decode errors from NMR/SYSIN/SYSOUT header codecs.
    pub fn handle_record(&mut self, record: &Record) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::SignedOn {
            return Err(invalid_state(self.state, "handle_record"));
        }

        let mut actions = Vec::new();
        for tuple in &record.tuples {
            match tuple.rcb {
                0x90 => {
                    let bcb = self.advance_bcb();
                    let raw = record::build_record(bcb, self.fcs, 0xA0, tuple.srcb, &[0x00, 0x00], false);
                    actions.push(SessionAction::SendFrame(crate::framed(&raw)));
                },
                0xA0 => actions.push(SessionAction::StreamPermissionGranted { rcb: tuple.srcb }),
                0xB0 => actions.push(SessionAction::StreamPermissionDenied { rcb: tuple.srcb }),
                0xC0 | 0xD0 | 0xE0 => {},
                NCCR_RCB => {
                    if tuple.srcb == NCCR_B {
                        self.state = SessionState::Disconnected;
                        self.signed_on = false;
                        actions.push(SessionAction::Close { reason: "peer signoff".to_string() });
                    }
                },
                0x9A => {
                    let msg = nmr::decode(&tuple.data)?;
                    actions.push(SessionAction::DeliverNmr(msg));
                },
                rcb if rcb & 0x0F == 0x08 => {
                    let decoded = stream::decode_sysin(tuple.srcb, &tuple.data)?;
                    actions.push(SessionAction::DeliverSysin(decoded));
                },
                rcb if rcb & 0x0F == 0x09 => {
                    let decoded = stream::decode_sysout(tuple.srcb, &tuple.data)?;
                    actions.push(SessionAction::DeliverSysout(decoded));
                },
                _ => {},
            }
        }
        Ok(actions)
    }

    /// Send a B-record signoff and reset local session state.
    pub fn signoff(&mut self) -> Vec<SessionAction> {
        let bcb = self.advance_bcb();
        let raw = record::build_record(bcb, self.fcs, NCCR_RCB, NCCR_B, &[], false);
        self.state = SessionState::Disconnected;
        self.signed_on = false;
        self.bcb = 0x80;
        vec![
            SessionAction::SendFrame(crate::framed(&raw)),
            SessionAction::Close { reason: "local signoff".to_string() },
        ]
    }

    /// Elapsed time since handshake start, if the configured timeout has
    /// been exceeded while still mid-handshake. `None` once signed on.
    #[must_use]
    pub fn check_handshake_timeout(&self, now: I) -> Option<Duration> {
        if self.signed_on {
            return None;
        }
        let elapsed = now - self.handshake_started;
        if elapsed > self.config.handshake_timeout { Some(elapsed) } else { None }
    }
}

fn invalid_state(state: SessionState, operation: &str) -> SessionError {
    SessionError::InvalidState { state, operation: operation.to_string() }
}

fn build_i_record(config: &SessionConfig) -> Vec<u8> {
    let len = 0x29u8;
    let rhost = ebcdic::pad_name(&config.remote_name);
    let own_node = config.local_node;
    let nccievnt = [0u8; 4];
    let nccirest = [0x00, 0x64];
    let bufsize = [0x80, 0x00];
    let password = ebcdic::pad_name(&config.password);
    let nccflg = 0x00u8;
    let nccifeat = [0x15, 0x00, 0x00, 0x00];

    let mut out = Vec::with_capacity(0x2A);
    out.push(len);
    out.extend_from_slice(&rhost);
    out.push(own_node);
    out.extend_from_slice(&nccievnt);
    out.extend_from_slice(&nccirest);
    out.extend_from_slice(&bufsize);
    out.extend_from_slice(&password);
    out.extend_from_slice(&password);
    out.push(nccflg);
    out.extend_from_slice(&nccifeat);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> SessionConfig {
        SessionConfig {
            local_name: "CLASS".to_string(),
            remote_name: "ZM15".to_string(),
            local_ip: [127, 0, 0, 1],
            remote_ip: [10, 0, 0, 2],
            password: "SECRET".to_string(),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn full_handshake_reaches_signed_on() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());

        session.mark_tcp_up().unwrap();
        let actions = session.initiate(t0).unwrap();
        assert_eq!(session.state(), SessionState::OpenSent);
        assert!(matches!(actions[0], SessionAction::SendOpen(_)));

        let reply = OpenControl { r: 0, ..OpenControl::request("CLASS", [127, 0, 0, 1], "ZM15", [10, 0, 0, 2]) };
        session.handle_open_reply(&reply).unwrap();
        assert_eq!(session.state(), SessionState::SohSent);

        session.handle_soh_reply(&DLE_ACK0).unwrap();
        assert_eq!(session.state(), SessionState::IRecSent);

        let mut j_zero = vec![0u8; 14];
        j_zero[9] = 0x02; // NCCIQUAL
        session.handle_j_record(&j_zero).unwrap();
        assert_eq!(session.state(), SessionState::KRecSent);

        let mut j_nonzero = vec![0u8; 14];
        j_nonzero[9] = 0x02;
        j_nonzero[10..14].copy_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        session.handle_j_record(&j_nonzero).unwrap();
        assert_eq!(session.state(), SessionState::SignedOn);
        assert!(session.is_signed_on());
        assert_eq!(session.remote_node(), Some(0x02));
    }

    #[test]
    fn signed_on_constructor_skips_handshake() {
        let t0 = Instant::now();
        let session: Session<Instant> = Session::signed_on(t0, test_config());
        assert_eq!(session.state(), SessionState::SignedOn);
        assert!(session.is_signed_on());
    }

    #[test]
    fn rejected_open_closes_session() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        session.mark_tcp_up().unwrap();
        session.initiate(t0).unwrap();

        let reply = OpenControl { r: 4, ..OpenControl::request("CLASS", [127, 0, 0, 1], "ZM15", [10, 0, 0, 2]) };
        let err = session.handle_open_reply(&reply).unwrap_err();
        assert!(matches!(err, SessionError::HandshakeRejected { code: 4, .. }));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn heartbeat_reply_advances_bcb() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        let starting_bcb = session.bcb();
        let action = session.handle_heartbeat();
        assert!(matches!(action, SessionAction::SendFrame(_)));
        assert_eq!(session.bcb(), next_bcb(starting_bcb));
    }

    #[test]
    fn signed_on_dispatch_decodes_nmr() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        session.state = SessionState::SignedOn;
        session.signed_on = true;

        let msg_bytes = nmr::build_command("$DA", "ZM15", "CLASS");
        let raw = record::build_record(0x80, [0, 0], 0x9A, 0x00, &msg_bytes, true);
        let record = record::parse_record(&raw).unwrap();

        let actions = session.handle_record(&record).unwrap();
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], SessionAction::DeliverNmr(_)));
    }

    #[test]
    fn send_record_requires_signed_on() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        let err = session.send_record(0x9A, 0x00, b"hi", true).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[test]
    fn send_record_advances_bcb_once_signed_on() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        session.state = SessionState::SignedOn;
        session.signed_on = true;
        let starting_bcb = session.bcb();

        let action = session.send_record(0x9A, 0x00, b"hello", true).unwrap();
        assert!(matches!(action, SessionAction::SendFrame(_)));
        assert_eq!(session.bcb(), next_bcb(starting_bcb));
    }

    #[test]
    fn send_record_multi_batches_tuples_into_one_frame() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        session.state = SessionState::SignedOn;
        session.signed_on = true;

        let tuples: Vec<(u8, u8, &[u8])> = vec![(0x98, 0xC0, b"HEADER"), (0x98, 0xC1, b"LINE1")];
        let action = session.send_record_multi(&tuples, false).unwrap();
        assert!(matches!(action, SessionAction::SendFrame(_)));
    }

    #[test]
    fn signoff_sends_b_record_and_resets_bcb() {
        let t0 = Instant::now();
        let mut session: Session<Instant> = Session::new(t0, test_config());
        session.state = SessionState::SignedOn;
        session.signed_on = true;
        session.bcb = 0x85;

        let actions = session.signoff();
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[1], SessionAction::Close { .. }));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.bcb(), 0x80);
    }
}
