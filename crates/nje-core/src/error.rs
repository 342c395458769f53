//! Error types for the NJE session engine.
//!
//! Strongly-typed errors for handshake rejection, unexpected records, and
//! framing problems, matching spec.md §7's error kinds. We avoid using
//! `std::io::Error` for protocol logic to keep transient/fatal distinctions
//! type-safe.

use std::{io, time::Duration};

use thiserror::Error;

use crate::session::SessionState;

/// Errors that can occur while driving the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Invalid state transition attempted (API called out of order).
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: SessionState,
        /// Operation that was attempted.
        operation: String,
    },

    /// The OPEN handshake was rejected by the peer.
    #[error("handshake rejected: {reason} (R={code})")]
    HandshakeRejected {
        /// The `R` byte from the peer's OPEN reply (1-4).
        code: u8,
        /// Human-readable reason matching spec.md §4.3's R-byte table.
        reason: &'static str,
    },

    /// A record arrived that the current handshake state did not expect,
    /// e.g. SOH-ENQ not followed by DLE-ACK0.
    #[error("unexpected record in state {state:?}: {detail}")]
    UnexpectedRecord {
        /// Current state when the unexpected record arrived.
        state: SessionState,
        /// What was expected vs received.
        detail: String,
    },

    /// TTB/TTR length mismatch, malformed DLE-STX, or an SCB run extending
    /// past segment end. Logged and the current block is discarded;
    /// dispatch continues if the socket is still coherent.
    #[error("framing error: {0}")]
    FramingError(String),

    /// Handshake did not complete within the configured timeout.
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// Underlying transport error (socket open/read/write failure).
    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts and framing errors (best-effort recoverable per spec.md §7)
    /// are transient; handshake rejection and unexpected records indicate a
    /// broken or incompatible peer and are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. } | Self::FramingError(_))
    }
}

impl From<SessionError> for io::Error {
    fn from(err: SessionError) -> Self {
        let kind = match &err {
            SessionError::HandshakeTimeout { .. } => io::ErrorKind::TimedOut,
            SessionError::InvalidState { .. }
            | SessionError::HandshakeRejected { .. }
            | SessionError::UnexpectedRecord { .. }
            | SessionError::FramingError(_) => io::ErrorKind::InvalidData,
            SessionError::Transport(_) => io::ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<nje_proto::ProtoError> for SessionError {
    fn from(err: nje_proto::ProtoError) -> Self {
        Self::FramingError(err.to_string())
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Map an OPEN control record's `R` byte to the rejection reason spec.md
/// §4.3 names.
#[must_use]
pub fn open_reject_reason(code: u8) -> &'static str {
    match code {
        1 => "bad RHOST/OHOST",
        2 => "peer link will reset",
        3 => "peer actively opening",
        4 => "RHOST invalid or link already up",
        _ => "unknown rejection code",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_framing_errors_are_transient() {
        assert!(SessionError::HandshakeTimeout { elapsed: Duration::from_secs(31) }.is_transient());
        assert!(SessionError::FramingError("bad TTB".to_string()).is_transient());
    }

    #[test]
    fn handshake_rejection_is_fatal() {
        assert!(
            !SessionError::HandshakeRejected { code: 1, reason: open_reject_reason(1) }
                .is_transient()
        );
    }

    #[test]
    fn reject_reason_table_matches_spec() {
        assert_eq!(open_reject_reason(1), "bad RHOST/OHOST");
        assert_eq!(open_reject_reason(4), "RHOST invalid or link already up");
    }
}
