//! Blocking TCP transport, TLS-first per spec.md §6.
//!
//! The client attempts a TLS handshake immediately after the TCP connect
//! completes. Any handshake failure (no cert, reset, timeout) drops that
//! socket and opens a fresh plain TCP connection to the same address — the
//! NJE protocol itself carries no STARTTLS negotiation, so there is no way
//! to downgrade mid-connection without starting over.

use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned, pki_types::ServerName};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Certificate verification policy for the TLS-first connect attempt.
///
/// Defaults to [`TlsVerification::Insecure`], matching the original
/// client's behavior of accepting any certificate. Verification is out of
/// this core's policy scope per spec.md §6; this type exists so a caller
/// who wants real verification has somewhere to plug it in.
#[derive(Clone, Default)]
pub enum TlsVerification {
    /// Accept any certificate presented by the peer.
    #[default]
    Insecure,
    /// Verify against the supplied root store with standard WebPKI chain
    /// validation.
    Platform(Arc<RootCertStore>),
}

/// A connected transport, either over TLS or plain TCP.
pub enum Socket {
    /// TLS handshake succeeded; all further I/O is encrypted.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// TLS was not attempted or failed; plain TCP.
    Plain(TcpStream),
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.read(buf),
            Self::Plain(stream) => stream.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.write(buf),
            Self::Plain(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tls(stream) => stream.flush(),
            Self::Plain(stream) => stream.flush(),
        }
    }
}

/// Connect to `host:port`, attempting TLS first and falling back to plain
/// TCP on any handshake failure.
///
/// # Errors
///
/// Returns [`ClientError::Network`] if the TCP connect itself fails (on
/// both the TLS attempt and the plain fallback).
pub fn connect(host: &str, port: u16, timeout: Duration, verification: &TlsVerification) -> Result<Socket, ClientError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(ClientError::Network)?
        .next()
        .ok_or_else(|| ClientError::Network(io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved")))?;

    let tls_stream = TcpStream::connect_timeout(&addr, timeout).map_err(ClientError::Network)?;
    tls_stream.set_read_timeout(Some(timeout)).map_err(ClientError::Network)?;
    tls_stream.set_nodelay(true).map_err(ClientError::Network)?;

    match try_tls_handshake(tls_stream, host, verification) {
        Ok(stream) => {
            debug!(%host, port, "TLS handshake succeeded");
            Ok(Socket::Tls(Box::new(stream)))
        },
        Err(err) => {
            warn!(%host, port, %err, "TLS handshake failed, falling back to plain TCP");
            let plain = TcpStream::connect_timeout(&addr, timeout).map_err(ClientError::Network)?;
            plain.set_read_timeout(Some(timeout)).map_err(ClientError::Network)?;
            plain.set_nodelay(true).map_err(ClientError::Network)?;
            Ok(Socket::Plain(plain))
        },
    }
}

fn try_tls_handshake(
    mut sock: TcpStream,
    host: &str,
    verification: &TlsVerification,
) -> Result<StreamOwned<ClientConnection, TcpStream>, io::Error> {
    let config = client_config(verification);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let mut conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock)?;
    }

    Ok(StreamOwned::new(conn, sock))
}

fn client_config(verification: &TlsVerification) -> ClientConfig {
    match verification {
        TlsVerification::Insecure => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
            .with_no_client_auth(),
        TlsVerification::Platform(roots) => {
            ClientConfig::builder().with_root_certificates((**roots).clone()).with_no_client_auth()
        },
    }
}

/// Certificate verifier that accepts any certificate. Matches the original
/// client's always-insecure TLS policy (spec.md §9's design note).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_verification_is_insecure() {
        assert!(matches!(TlsVerification::default(), TlsVerification::Insecure));
    }

    #[test]
    fn insecure_client_config_builds_without_panicking() {
        let _config = client_config(&TlsVerification::Insecure);
    }
}
