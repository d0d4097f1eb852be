//! Configuration shared by the engine and the command-line front end.

mod timeouts;
mod tls;

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

pub use timeouts::ClientTimeouts;
pub use tls::{DEFAULT_MAX_FRAGMENT_SIZE, TlsConfig};

/// Where to submit mail, and who to log in as.
///
/// The engine keeps a shared, read-only handle to these for the length of a
/// transfer; replacing them only affects transfers submitted afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCredentials {
    pub login: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Verify the relay's certificate chain. Only meaningful for TLS.
    #[serde(default = "default_validate_certificates")]
    pub validate_certificates: bool,
}

const fn default_port() -> u16 {
    465
}

const fn default_validate_certificates() -> bool {
    true
}

impl ServerCredentials {
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            host: host.into(),
            port,
            validate_certificates: default_validate_certificates(),
        }
    }

    /// Toggle certificate-chain validation.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("validate_certificates", &self.validate_certificates)
            .finish()
    }
}

/// How the message body is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodyFormat {
    /// `text/plain`, body sent as given.
    #[default]
    Plain,
    /// `text/html`, body wrapped in a minimal HTML document.
    Html,
}

/// Which transport the engine opens for each transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Unencrypted TCP, typically port 25 or 587.
    Plain,
    /// TLS from the first byte, typically port 465.
    #[default]
    Tls,
}

/// Engine behaviour that is independent of the relay being used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Name announced in `HELO`.
    ///
    /// Default: `localhost`
    #[serde(default = "defaults::client_name")]
    pub client_name: String,

    /// Default: `Plain`
    #[serde(default)]
    pub body_format: BodyFormat,

    /// Wait for the 221 reply to `QUIT` before closing.
    ///
    /// Turning this off saves a round trip; the message has already been
    /// accepted at that point, so the reply never changes the outcome.
    ///
    /// Default: `true`
    #[serde(default = "defaults::wait_for_goodbye")]
    pub wait_for_goodbye: bool,

    /// Pause between polls in the blocking and async drivers.
    ///
    /// Default: 25 milliseconds
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Default: `Tls`
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl SenderConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            client_name: defaults::client_name(),
            body_format: BodyFormat::default(),
            wait_for_goodbye: defaults::wait_for_goodbye(),
            poll_interval_ms: defaults::poll_interval_ms(),
            transport: TransportKind::default(),
            tls: TlsConfig::default(),
            timeouts: ClientTimeouts::default(),
        }
    }
}

mod defaults {
    pub fn client_name() -> String {
        String::from("localhost")
    }
    pub const fn wait_for_goodbye() -> bool {
        true
    }
    pub const fn poll_interval_ms() -> u64 {
        25
    }
}
