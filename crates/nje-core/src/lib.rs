//! Session handshake and steady-state dispatch state machine for the NJE
//! protocol: a pure, sans-I/O layer above [`nje_proto`]'s codec.

pub mod error;
pub mod session;
pub mod stream;

pub use error::SessionError;
pub use session::{Session, SessionAction, SessionConfig, SessionState};
pub use stream::StreamRecord;

use nje_proto::framing::{make_ttb, make_ttr};

/// Wrap a DLE-STX (or bare control) payload in its TTR and TTB length
/// prefixes, ready for the socket.
pub(crate) fn framed(data: &[u8]) -> Vec<u8> {
    make_ttb(&make_ttr(data)).to_vec()
}
