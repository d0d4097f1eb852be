//! Byte streams to the relay.
//!
//! The engine only ever sees a [`Transport`]: something it can write command
//! lines to, drain whatever bytes have arrived from, and close. How that
//! stream is opened is decided by a [`Connector`], chosen from configuration
//! or supplied by the caller:
//!
//! - [`PlainConnector`] for unencrypted TCP
//! - [`TlsConnector`] for TLS from the first byte
//!
//! Reads never block. Writes block for at most the command timeout.

mod plain;
mod tls;

use std::{
    io,
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use postie_common::config::{ClientTimeouts, ServerCredentials, TlsConfig, TransportKind};
use thiserror::Error;

pub use plain::{PlainConnector, PlainTransport};
pub use tls::{TlsConnector, TlsTransport};

/// Errors raised while opening or using a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// IO error occurred during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The host name did not resolve to any address.
    #[error("Unable to resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// The host name cannot be used for TLS server name indication.
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    /// TLS/SSL error occurred.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Connection was closed unexpectedly.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// The relay sent more than a reply line's worth without a line break.
    #[error("Reply line longer than {0} bytes")]
    LineTooLong(usize),
}

/// An open, exclusively owned stream to the relay.
pub trait Transport: Send {
    /// Writes all of `bytes`, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the write times out.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads whatever is available right now, returning 0 when nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the peer has closed
    /// the stream, or the underlying error.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// # Errors
    ///
    /// Returns an error if buffered bytes cannot be written out.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Shuts the stream down. Called once, when the transfer ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown itself fails; the stream is unusable
    /// either way.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Writes `line` followed by CRLF and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\r\n")?;
        self.flush()
    }
}

/// Opens a [`Transport`] to the relay named in the credentials.
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the relay cannot be reached or the handshake fails.
    fn connect(
        &self,
        credentials: &ServerCredentials,
        timeouts: &ClientTimeouts,
    ) -> Result<Box<dyn Transport>, TransportError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// The connector for a configured transport kind.
#[must_use]
pub fn connector_for(kind: TransportKind, tls: &TlsConfig) -> Box<dyn Connector> {
    match kind {
        TransportKind::Plain => Box::new(PlainConnector),
        TransportKind::Tls => Box::new(TlsConnector::new(*tls)),
    }
}

/// Resolve and connect, trying each address in turn.
fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let mut last_error = None;

    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                tracing::debug!(%addr, %err, "Connection attempt failed");
                last_error = Some(err);
            }
        }
    }

    Err(last_error.map_or_else(
        || TransportError::Resolve {
            host: host.to_string(),
            port,
        },
        TransportError::Io,
    ))
}

/// Run `write` with the socket in blocking mode, restoring non-blocking
/// reads afterwards.
fn blocking<T>(
    socket: &TcpStream,
    write: impl FnOnce() -> io::Result<T>,
) -> Result<T, TransportError> {
    socket.set_nonblocking(false)?;
    let result = write();
    socket.set_nonblocking(true)?;
    Ok(result?)
}

/// Map a non-blocking read result onto the [`Transport`] contract.
fn available(read: io::Result<usize>) -> Result<usize, TransportError> {
    match read {
        Ok(0) => Err(TransportError::ConnectionClosed),
        Ok(n) => Ok(n),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(TransportError::ConnectionClosed)
        }
        Err(err) => Err(err.into()),
    }
}

fn shutdown(socket: &TcpStream) -> Result<(), TransportError> {
    match socket.shutdown(Shutdown::Both) {
        Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err.into()),
        _ => Ok(()),
    }
}
