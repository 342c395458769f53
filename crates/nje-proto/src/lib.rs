//! Wire codec, record framing, and fixed-layout header parsing for the NJE
//! (Network Job Entry) protocol.
//!
//! This crate is pure: no sockets, no clocks. Three layers, bottom to top:
//!
//! - [`framing`]: TTB block / TTR record length prefixes.
//! - [`scb`]: String Control Byte run-length compression used inside record
//!   payloads.
//! - [`record`]: DLE-STX record assembly, BCB/FCS, RCB/SRCB tuples, and the
//!   253-byte segment continuation rule.
//! - [`headers`]: Job Header, Job Trailer, Data-Set Header, and Network
//!   Message Record layouts carried inside SYSIN/SYSOUT/NMR records.
//!
//! [`nje_core`] drives the session state machine on top of these types;
//! `nje-client` owns the socket and EBCDIC text construction around them.

pub mod ebcdic;
pub mod errors;
pub mod framing;
pub mod headers;
pub mod open;
pub mod record;
pub mod scb;

pub use errors::{ProtoError, Result};
pub use headers::{DatasetHeader, JobHeader, JobTrailer, NmrBody, NmrMessage, NmrOutContext, NmrTypeFlags};
pub use open::OpenControl;
pub use record::{Record, RecordTuple};
