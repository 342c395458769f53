//! Top-level client: connect/handshake/signon, message and command round
//! trips, JCL submission, and offline capture replay.
//!
//! Drives [`nje_core::Session`] by turning each [`SessionAction`] it returns
//! into socket I/O over a [`transport::Socket`]. Grounded in the original
//! client's `connect`/`initiate`/`signon`/`sendMessage`/`sendCommand`/
//! `sendJCL`/`analyze` methods.

use std::{
    io::{self, Read, Write},
    net::{IpAddr, ToSocketAddrs},
    time::{Duration, Instant},
};

use nje_core::{Session, SessionAction, SessionConfig, StreamRecord, session::DEFAULT_HANDSHAKE_TIMEOUT};
use nje_proto::headers::{njt, nmr};
use nje_proto::{NmrBody, NmrMessage, ebcdic, framing, record};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::jcl;
use crate::transport::{self, Socket, TlsVerification};

/// NCCR general control byte, shared by all handshake/signoff records.
const NCCR_RCB: u8 = 0xF0;
/// EBCDIC letter 'J': the peer's response signon record.
const NCCR_J: u8 = 0xD1;

/// Per-connection configuration: node names, signon password, and the TLS
/// policy for the transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// RHOST: the remote node's name, as given on the command line.
    pub rhost: String,
    /// OHOST: the local node's name, as presented to the remote.
    pub ohost: String,
    /// RIP: the local node's claimed IPv4 address. Defaults to loopback,
    /// matching the original client's `rip="127.0.0.1"` constructor default.
    pub rip: [u8; 4],
    /// Signon password.
    pub password: String,
    /// Local node number, defaults to `0x01`.
    pub local_node: u8,
    /// Time allowed for the full OPEN/SOH/I/J/K/L handshake.
    pub handshake_timeout: Duration,
    /// Certificate verification policy for the TLS-first connect attempt.
    pub tls: TlsVerification,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rhost: String::new(),
            ohost: String::new(),
            rip: [127, 0, 0, 1],
            password: String::new(),
            local_node: 0x01,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            tls: TlsVerification::default(),
        }
    }
}

/// An NJE client: owns the socket, the pure handshake/dispatch state
/// machine, and the messages/streams it has accumulated so far.
pub struct Client {
    config: ClientConfig,
    socket: Option<Socket>,
    session: Option<Session<Instant>>,
    nmr: Vec<NmrMessage>,
    sysin: Vec<StreamRecord>,
    sysout: Vec<StreamRecord>,
    pending_stream_grant: Option<bool>,
    offline: bool,
}

impl Client {
    /// Create a new, disconnected client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            socket: None,
            session: None,
            nmr: Vec::new(),
            sysin: Vec::new(),
            sysout: Vec::new(),
            pending_stream_grant: None,
            offline: false,
        }
    }

    /// Open the TCP (TLS-first) connection to `host:port` and create the
    /// session state machine. Resolves OIP dynamically from `host`, mirroring
    /// the original client's `socket.gethostbyname(self.host)` call; RIP
    /// stays the caller-configured (or default loopback) address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if DNS resolution or the TCP connect
    /// fails, or [`ClientError::Session`] if a session is already active.
    pub fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), ClientError> {
        let oip = resolve_ipv4(host, port)?;
        let socket = transport::connect(host, port, timeout, &self.config.tls)?;

        let session_config = SessionConfig {
            handshake_timeout: self.config.handshake_timeout,
            local_name: self.config.ohost.clone(),
            remote_name: self.config.rhost.clone(),
            local_ip: oip,
            remote_ip: self.config.rip,
            local_node: self.config.local_node,
            password: self.config.password.clone(),
        };
        let mut session = Session::new(Instant::now(), session_config);
        session.mark_tcp_up()?;

        self.socket = Some(socket);
        self.session = Some(session);
        Ok(())
    }

    /// Send the OPEN control record, beginning the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if not yet connected, or propagates
    /// a [`ClientError::Session`] if the handshake is already in progress.
    pub fn initiate(&mut self) -> Result<(), ClientError> {
        let actions = self.session_mut()?.initiate(Instant::now())?;
        self.dispatch(actions)?;
        Ok(())
    }

    /// Drive the OPEN/SOH-ENQ/I-J-K-L exchange to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] on any socket failure, or
    /// [`ClientError::Session`] if the peer rejects the OPEN or sends an
    /// unexpected record.
    pub fn signon(&mut self) -> Result<(), ClientError> {
        let open_reply = self.read_open_reply()?;
        let actions = self.session_mut()?.handle_open_reply(&open_reply)?;
        self.dispatch(actions)?;

        let soh_records = self.read_records()?;
        let soh_reply = soh_records
            .first()
            .ok_or_else(|| ClientError::Session(nje_core::SessionError::FramingError("empty SOH-ENQ reply block".to_string())))?;
        let actions = self.session_mut()?.handle_soh_reply(soh_reply)?;
        self.dispatch(actions)?;

        while !self.session_mut()?.is_signed_on() {
            let records = self.read_records()?;
            for raw in &records {
                if record::is_heartbeat(raw.len()) {
                    let action = self.session_mut()?.handle_heartbeat();
                    self.dispatch(vec![action])?;
                    continue;
                }
                let parsed = parse_record(raw)?;
                for tuple in &parsed.tuples {
                    if tuple.rcb == NCCR_RCB && tuple.srcb == NCCR_J {
                        let actions = self.session_mut()?.handle_j_record(&tuple.data)?;
                        self.dispatch(actions)?;
                    }
                }
            }
        }

        info!(rhost = %self.config.rhost, ohost = %self.config.ohost, "signon complete");
        Ok(())
    }

    /// Convenience composing [`Client::connect`], [`Client::initiate`], and
    /// [`Client::signon`].
    ///
    /// # Errors
    ///
    /// Propagates any error from the three composed steps.
    pub fn session(&mut self, host: &str, port: u16, timeout: Duration) -> Result<(), ClientError> {
        self.connect(host, port, timeout)?;
        self.initiate()?;
        self.signon()
    }

    /// Send a console message, optionally directed at a specific user, then
    /// sign off. Matches the original client's fire-and-forget `sendMessage`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if not yet signed on, or any
    /// transport error encountered while sending.
    pub fn send_message(&mut self, text: &str, user: Option<&str>) -> Result<(), ClientError> {
        let to = self.config.rhost.clone();
        let from = self.config.ohost.clone();
        let body = match user {
            Some(u) => nmr::build_user_message(text, u, &to, &from),
            None => nmr::build_console_message(text, &to, &from),
        };
        let action = self.session_mut()?.send_record(0x9A, 0x00, &body, true)?;
        self.dispatch(vec![action])?;
        self.signoff()
    }

    /// Send an operator command, collect the NMR reply text, then sign off.
    ///
    /// Returns `None` if no reply text was collected, matching the original
    /// client's `return False` on an empty accumulated message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if not yet signed on, or any
    /// transport error encountered while sending or receiving.
    pub fn send_command(&mut self, command: &str) -> Result<Option<String>, ClientError> {
        let to = self.config.rhost.clone();
        let from = self.config.ohost.clone();
        let body = nmr::build_command(command, &to, &from);
        let action = self.session_mut()?.send_record(0x9A, 0x00, &body, true)?;
        self.dispatch(vec![action])?;

        while self.nmr.is_empty() {
            self.pump()?;
        }

        let message = self
            .nmr
            .drain(..)
            .filter_map(|m| match m.body {
                NmrBody::Text(text) => Some(text),
                NmrBody::FormattedCommand(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        self.signoff()?;
        Ok(if message.is_empty() { None } else { Some(message) })
    }

    /// Submit a JCL deck as `user_id`/`group`, wait for SYSOUT to begin
    /// arriving, then sign off. `entry_timestamp` is the STCK-format value
    /// stamped into the Job Header; the original client leaves this opaque.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Jcl`] if the deck cannot be parsed or the peer
    /// denies the stream request, [`ClientError::Session`] if not signed on,
    /// or any transport error encountered along the way.
    pub fn send_jcl(
        &mut self,
        jcl_text: &str,
        job_number: i32,
        user_id: &str,
        group: &str,
        entry_timestamp: [u8; 8],
    ) -> Result<(), ClientError> {
        let local_node = self.config.ohost.clone();
        let remote_node = self.config.rhost.clone();
        let submission = jcl::parse_submission(jcl_text, job_number, user_id, group, &local_node, &remote_node, entry_timestamp)?;

        info!(
            job_name = %submission.job_name,
            accounting = %submission.accounting,
            programmer = %submission.programmer,
            "submitting JCL"
        );

        let request = self.session_mut()?.send_record(0x90, 0x98, &[0x00, 0x00], false)?;
        self.dispatch(vec![request])?;
        while self.pending_stream_grant.is_none() {
            self.pump()?;
        }
        if self.pending_stream_grant.take() != Some(true) {
            return Err(ClientError::Jcl("peer denied the SYSIN stream request".to_string()));
        }

        let encoded_lines: Vec<Vec<u8>> = submission
            .lines
            .iter()
            .map(|line| {
                let mut out = vec![0x50];
                out.extend_from_slice(&ebcdic::ascii_to_ebcdic(line.as_bytes()));
                out
            })
            .collect();
        let trailer = njt::build_skeleton();

        let mut tuples: Vec<(u8, u8, &[u8])> = vec![(0x98, 0xC0, submission.header.as_slice())];
        tuples.extend(encoded_lines.iter().map(|line| (0x98, 0x80, line.as_slice())));
        tuples.push((0x98, 0xD0, trailer.as_slice()));

        let send = self.session_mut()?.send_record_multi(&tuples, true)?;
        self.dispatch(vec![send])?;

        let close = self.session_mut()?.send_record(0x98, 0x00, &[0x00, 0x00], false)?;
        self.dispatch(vec![close])?;

        while self.sysout.is_empty() {
            self.pump()?;
        }

        self.signoff()
    }

    /// Replay a captured NJE byte dump offline: no socket, no handshake. The
    /// capture is assumed to begin mid-session, after signon, matching the
    /// original client's `analyze()`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Capture`] if `data` cannot be split into TTB
    /// blocks or TTR records, or if a record fails to parse.
    pub fn analyze(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.offline = true;
        if self.session.is_none() {
            self.session = Some(Session::signed_on(Instant::now(), SessionConfig::default()));
        }

        let blocks = framing::split_ttb_blocks(data).map_err(|e| ClientError::Capture(e.to_string()))?;
        for content in blocks {
            let records = framing::split_ttr_records(content).map_err(|e| ClientError::Capture(e.to_string()))?;
            for raw in records {
                if record::is_heartbeat(raw.len()) {
                    continue;
                }
                let parsed = record::parse_record(raw).map_err(|e| ClientError::Capture(e.to_string()))?;
                let actions = self.session_mut()?.handle_record(&parsed).map_err(|e| ClientError::Capture(e.to_string()))?;
                self.dispatch(actions)?;
            }
        }
        Ok(())
    }

    /// Send a B-record signoff and close the connection state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if no session has been started.
    pub fn signoff(&mut self) -> Result<(), ClientError> {
        let actions = self.session_mut()?.signoff();
        self.dispatch(actions)
    }

    /// Accumulated decoded NMRs, in arrival order.
    #[must_use]
    pub fn nmr_messages(&self) -> &[NmrMessage] {
        &self.nmr
    }

    /// Accumulated decoded SYSIN stream records, in arrival order.
    #[must_use]
    pub fn sysin_records(&self) -> &[StreamRecord] {
        &self.sysin
    }

    /// Accumulated decoded SYSOUT stream records, in arrival order.
    #[must_use]
    pub fn sysout_records(&self) -> &[StreamRecord] {
        &self.sysout
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_signed_on(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_signed_on)
    }

    /// Compatibility shim: verbosity is controlled by the ambient `tracing`
    /// subscriber the caller installs (see `nje-cli`), not by this client.
    /// Kept so callers porting scripts that called `set_debuglevel` have
    /// somewhere to put the call.
    pub fn set_debuglevel(&mut self, _level: u8) {}

    /// Switch into offline mode: [`Client::analyze`] becomes the only valid
    /// entry point, and [`Client::connect`] should not be called.
    pub fn set_offline(&mut self) {
        self.offline = true;
    }

    fn session_mut(&mut self) -> Result<&mut Session<Instant>, ClientError> {
        self.session.as_mut().ok_or_else(not_connected)
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let socket = self.socket.as_mut().ok_or_else(not_connected)?;
        socket.write_all(bytes).map_err(ClientError::Network)?;
        socket.flush().map_err(ClientError::Network)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ClientError> {
        let socket = self.socket.as_mut().ok_or_else(not_connected)?;
        socket.read_exact(buf).map_err(ClientError::Network)
    }

    fn read_open_reply(&mut self) -> Result<nje_proto::OpenControl, ClientError> {
        let mut buf = [0u8; nje_proto::open::OPEN_RECORD_LEN];
        self.read_exact(&mut buf)?;
        nje_proto::open::parse(&buf).map_err(|e| ClientError::Session(nje_core::SessionError::from(e)))
    }

    fn read_ttb_block(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut header = [0u8; framing::TTB_HEADER_LEN];
        self.read_exact(&mut header)?;
        let total = framing::read_ttb_len(&header).map_err(|e| ClientError::Session(nje_core::SessionError::from(e)))?;
        if total < framing::TTB_HEADER_LEN {
            return Err(ClientError::Session(nje_core::SessionError::FramingError(format!(
                "TTB block shorter than its own header: {total} bytes"
            ))));
        }
        let mut rest = vec![0u8; total - framing::TTB_HEADER_LEN];
        self.read_exact(&mut rest)?;

        let mut full = header.to_vec();
        full.extend_from_slice(&rest);
        let blocks = framing::split_ttb_blocks(&full).map_err(|e| ClientError::Session(nje_core::SessionError::from(e)))?;
        Ok(blocks.first().copied().unwrap_or(&[]).to_vec())
    }

    fn read_records(&mut self) -> Result<Vec<Vec<u8>>, ClientError> {
        let content = self.read_ttb_block()?;
        let records = framing::split_ttr_records(&content).map_err(|e| ClientError::Session(nje_core::SessionError::from(e)))?;
        Ok(records.into_iter().map(<[u8]>::to_vec).collect())
    }

    /// Read and dispatch one TTB block's worth of steady-state records.
    fn pump(&mut self) -> Result<(), ClientError> {
        let records = self.read_records()?;
        for raw in &records {
            if record::is_heartbeat(raw.len()) {
                let action = self.session_mut()?.handle_heartbeat();
                self.dispatch(vec![action])?;
                continue;
            }
            let parsed = parse_record(raw)?;
            let actions = self.session_mut()?.handle_record(&parsed)?;
            self.dispatch(actions)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, actions: Vec<SessionAction>) -> Result<(), ClientError> {
        for action in actions {
            match action {
                SessionAction::SendOpen(open) => self.send_raw(&open.encode())?,
                SessionAction::SendFrame(bytes) => self.send_raw(&bytes)?,
                SessionAction::DeliverNmr(msg) => self.nmr.push(msg),
                SessionAction::DeliverSysin(rec) => self.sysin.push(rec),
                SessionAction::DeliverSysout(rec) => self.sysout.push(rec),
                SessionAction::StreamPermissionGranted { .. } => self.pending_stream_grant = Some(true),
                SessionAction::StreamPermissionDenied { .. } => self.pending_stream_grant = Some(false),
                SessionAction::Close { reason } => debug!(%reason, "session closed"),
            }
        }
        Ok(())
    }
}

fn not_connected() -> ClientError {
    ClientError::Network(io::Error::new(io::ErrorKind::NotConnected, "client is not connected"))
}

fn parse_record(raw: &[u8]) -> Result<nje_proto::Record, ClientError> {
    record::parse_record(raw).map_err(|e| ClientError::Session(nje_core::SessionError::from(e)))
}

fn resolve_ipv4(host: &str, port: u16) -> Result<[u8; 4], ClientError> {
    (host, port)
        .to_socket_addrs()
        .map_err(ClientError::Network)?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4.octets()),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| ClientError::Network(io::Error::new(io::ErrorKind::AddrNotAvailable, "no IPv4 address resolved")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_not_signed_on() {
        let client = Client::new(ClientConfig::default());
        assert!(!client.is_signed_on());
    }

    #[test]
    fn operations_before_connect_report_not_connected() {
        let mut client = Client::new(ClientConfig::default());
        let err = client.initiate().unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[test]
    fn analyze_decodes_nmr_from_a_raw_capture() {
        let mut client = Client::new(ClientConfig::default());
        let body = nmr::build_command("$DA", "ZM15", "CLASS");
        let raw = record::build_record(0x80, [0, 0], 0x9A, 0x00, &body, true);
        let ttb = nje_proto::framing::make_ttb(&nje_proto::framing::make_ttr(&raw));

        client.analyze(&ttb).unwrap();
        assert_eq!(client.nmr_messages().len(), 1);
    }

    #[test]
    fn analyze_on_garbage_reports_capture_error() {
        let mut client = Client::new(ClientConfig::default());
        let err = client.analyze(&[0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, ClientError::Capture(_)));
    }

    #[test]
    fn default_config_uses_loopback_rip_and_node_one() {
        let config = ClientConfig::default();
        assert_eq!(config.rip, [127, 0, 0, 1]);
        assert_eq!(config.local_node, 0x01);
    }
}
