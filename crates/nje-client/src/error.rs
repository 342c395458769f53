//! Client-facing error type.
//!
//! Wraps [`nje_core::SessionError`] with the transport- and API-level
//! failures `nje-client` itself introduces (TLS setup, offline replay, JCL
//! parsing), matching spec.md §7's error kinds.

use std::io;

use thiserror::Error;

/// Errors surfaced by the public client API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Socket open/read/write failure. Fatal to the session.
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// TLS handshake could not be established at all (not the "fall back to
    /// plain TCP" case, which is silent per spec.md §6).
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The session state machine rejected an operation or a peer record.
    #[error(transparent)]
    Session(#[from] nje_core::SessionError),

    /// The peer signed off (inbound B-record). Not an error to the caller,
    /// but surfaced here so `sendMessage`/`sendCommand` can distinguish a
    /// clean teardown from a mid-operation failure.
    #[error("peer signed off")]
    PeerSignoff,

    /// A caller-configured read timeout elapsed. Fatal to the in-flight
    /// operation, not necessarily to the process.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// `sendJCL`'s JOB-card parsing failed.
    #[error("JCL error: {0}")]
    Jcl(String),

    /// `analyze()` was given a byte dump that could not be split into TTB
    /// blocks at all.
    #[error("capture file error: {0}")]
    Capture(String),
}

impl ClientError {
    /// Returns true if the failure may succeed on retry.
    ///
    /// Timeouts are transient; everything else (rejection, framing, TLS
    /// setup, JCL parse failures) indicates a broken peer or a caller bug.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Session(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        assert!(ClientError::Timeout(std::time::Duration::from_secs(5)).is_transient());
    }

    #[test]
    fn peer_signoff_is_not_transient() {
        assert!(!ClientError::PeerSignoff.is_transient());
    }

    #[test]
    fn session_error_transience_propagates() {
        let err = ClientError::Session(nje_core::SessionError::FramingError("x".to_string()));
        assert!(err.is_transient());
    }
}
