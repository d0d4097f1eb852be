use std::{
    io::{self, Read, Write},
    net::TcpStream,
    sync::Arc,
};

use postie_common::{
    config::{ClientTimeouts, ServerCredentials, TlsConfig},
    internal,
};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
};

use super::{Connector, Transport, TransportError, available, open_tcp, shutdown};

/// Implicit TLS: the handshake starts as soon as TCP is up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector {
    config: TlsConfig,
}

impl TlsConnector {
    #[must_use]
    pub const fn new(config: TlsConfig) -> Self {
        Self { config }
    }

    fn client_config(validate_certificates: bool) -> Result<ClientConfig, TransportError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder =
            ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions()?;

        let config = if validate_certificates {
            builder
                .with_root_certificates(root_store())
                .with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        };

        Ok(config)
    }
}

impl Connector for TlsConnector {
    fn connect(
        &self,
        credentials: &ServerCredentials,
        timeouts: &ClientTimeouts,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if !credentials.validate_certificates {
            tracing::warn!(
                host = %credentials.host,
                "SECURITY WARNING: Certificate validation disabled for this relay"
            );
        }

        let server_name = ServerName::try_from(credentials.host.clone())
            .map_err(|e| TransportError::InvalidServerName(format!("{}: {e}", credentials.host)))?;
        let config = Self::client_config(credentials.validate_certificates)?;
        let connection = new_connection(config, server_name, self.config.max_fragment_size)?;

        let socket = open_tcp(&credentials.host, credentials.port, timeouts.connect())?;
        socket.set_read_timeout(Some(timeouts.connect()))?;
        socket.set_write_timeout(Some(timeouts.connect()))?;

        let mut stream = StreamOwned::new(connection, socket);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }

        internal!(
            level = DEBUG,
            "TLS established with {} ({:?}, {:?})",
            credentials.host,
            stream.conn.protocol_version(),
            stream
                .conn
                .negotiated_cipher_suite()
                .map(|suite| suite.suite())
        );

        stream.sock.set_read_timeout(Some(timeouts.command()))?;
        stream.sock.set_write_timeout(Some(timeouts.command()))?;
        stream.sock.set_nonblocking(true)?;

        Ok(Box::new(TlsTransport { stream }))
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}

/// Create the client side of the connection, asking for small records when
/// configured. A size rustls refuses is logged and dropped in favour of the
/// library defaults.
fn new_connection(
    mut config: ClientConfig,
    server_name: ServerName<'static>,
    max_fragment_size: Option<usize>,
) -> Result<ClientConnection, TransportError> {
    config.max_fragment_size = max_fragment_size;

    match ClientConnection::new(Arc::new(config.clone()), server_name.clone()) {
        Ok(mut connection) => {
            if let Some(size) = max_fragment_size {
                connection.set_buffer_limit(Some(size));
            }
            Ok(connection)
        }
        Err(rustls::Error::BadMaxFragmentSize) => {
            internal!(
                level = WARN,
                "Maximum fragment size {max_fragment_size:?} rejected, using defaults"
            );
            config.max_fragment_size = None;
            Ok(ClientConnection::new(Arc::new(config), server_name)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Platform roots first, the bundled Mozilla set when none load.
fn root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();

    let certs = rustls_native_certs::load_native_certs();
    let (added, ignored) = root_store.add_parsable_certificates(certs.certs);
    if !certs.errors.is_empty() || ignored > 0 {
        tracing::warn!(?certs.errors, ignored, "Some certificates could not be loaded");
    }

    if added == 0 {
        internal!(level = DEBUG, "No native roots found, using bundled roots");
        root_store
            .roots
            .extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    root_store
}

/// Accepts any certificate the relay presents.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// An established TLS session over a non-blocking socket.
pub struct TlsTransport {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("peer", &self.stream.sock.peer_addr().ok())
            .finish_non_exhaustive()
    }
}

impl TlsTransport {
    /// Push queued records out with the socket in blocking mode.
    fn drain(&mut self) -> Result<(), TransportError> {
        self.stream.sock.set_nonblocking(false)?;
        let mut result = Ok(());
        while self.stream.conn.wants_write() {
            if let Err(err) = self.stream.conn.write_tls(&mut self.stream.sock) {
                result = Err(err);
                break;
            }
        }
        self.stream.sock.set_nonblocking(true)?;
        Ok(result?)
    }
}

impl Transport for TlsTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut remaining = bytes;

        // The buffer limit caps how much plaintext is accepted at once.
        while !remaining.is_empty() {
            let written = self.stream.conn.writer().write(remaining)?;
            if written == 0 && !self.stream.conn.wants_write() {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            remaining = &remaining[written..];
            self.drain()?;
        }

        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        available(self.stream.read(buf))
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.conn.writer().flush()?;
        self.drain()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.stream.conn.send_close_notify();
        let drained = self.drain();
        shutdown(&self.stream.sock)?;
        drained
    }
}
