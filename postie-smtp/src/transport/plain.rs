use std::{
    io::{Read, Write},
    net::TcpStream,
    time::Duration,
};

use postie_common::{
    config::{ClientTimeouts, ServerCredentials},
    internal,
};

use super::{Connector, Transport, TransportError, available, blocking, open_tcp, shutdown};

/// Unencrypted TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainConnector;

impl Connector for PlainConnector {
    fn connect(
        &self,
        credentials: &ServerCredentials,
        timeouts: &ClientTimeouts,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if credentials.validate_certificates {
            internal!(
                level = DEBUG,
                "Certificate validation does not apply to plain connections to {}",
                credentials.host
            );
        }

        let socket = open_tcp(&credentials.host, credentials.port, timeouts.connect())?;
        Ok(Box::new(PlainTransport::new(socket, timeouts.command())?))
    }

    fn name(&self) -> &'static str {
        "plain"
    }
}

/// A TCP socket that reads without blocking.
#[derive(Debug)]
pub struct PlainTransport {
    socket: TcpStream,
}

impl PlainTransport {
    /// Takes over a connected socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket options cannot be set.
    pub fn new(socket: TcpStream, write_timeout: Duration) -> Result<Self, TransportError> {
        socket.set_write_timeout(Some(write_timeout))?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl Transport for PlainTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let socket = &self.socket;
        blocking(socket, || {
            let mut writer = socket;
            writer.write_all(bytes)
        })
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        available(self.socket.read(buf))
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(self.socket.flush()?)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        shutdown(&self.socket)
    }
}
