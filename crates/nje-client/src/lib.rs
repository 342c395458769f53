//! Client
//!
//! Public NJE client: connects over TLS-first TCP, drives the
//! [`nje_core::Session`] handshake, and exposes the operator-facing
//! operations (console messages, commands, JCL submission, offline capture
//! replay) on top of it.
//!
//! # Architecture
//!
//! The wire/session logic lives in `nje-proto` (codec) and `nje-core` (pure
//! handshake/dispatch state machine); this crate is the sans-I/O-to-I/O
//! driver, turning each [`nje_core::SessionAction`] into a read or write on
//! a [`transport::Socket`].
//!
//! # Components
//!
//! - [`Client`]: top-level connection, handshake, and operation API
//! - [`ClientConfig`]: per-connection node names, password, and TLS policy
//! - [`transport`]: TLS-first blocking socket
//! - [`ClientError`]: errors surfaced by the public API

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod jcl;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use error::ClientError;
pub use transport::{Socket, TlsVerification};
