//! Mock submission relay for exercising the engine over real TCP.
#![allow(dead_code)] // Each test binary uses its own subset of knobs
//!
//! Speaks just enough SMTP for `HELO`, `AUTH LOGIN`, one envelope and `QUIT`,
//! records what it was sent, and can be told to misbehave:
//! - answer any step with a different reply
//! - go quiet on the Nth command
//! - hang up after N commands
//!
//! With [`MockSmtpServerBuilder::with_tls`] every connection starts with a
//! TLS handshake using a freshly generated self-signed certificate.
//!
//! ```rust,no_run
//! let server = MockSmtpServer::builder()
//!     .with_password_response(535, "5.7.8 Authentication credentials invalid")
//!     .build()
//!     .await?;
//! ```

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::RwLock,
    time::timeout,
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        crypto::ring::default_provider,
        pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    },
};

/// Something the relay received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo(String),
    AuthLogin,
    /// A base64 line sent during `AUTH LOGIN`, as received
    Credential(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Everything between `DATA` and the terminating dot
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    helo_response: SmtpResponse,
    auth_response: SmtpResponse,
    username_response: SmtpResponse,
    password_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    quit_response: SmtpResponse,

    // Failure injection
    drop_after_commands: Option<usize>,
    silent_on_command: Option<usize>,

    tls: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "mock.example.com ESMTP"),
            helo_response: SmtpResponse::new(250, "mock.example.com"),
            auth_response: SmtpResponse::new(334, "VXNlcm5hbWU6"),
            username_response: SmtpResponse::new(334, "UGFzc3dvcmQ6"),
            password_response: SmtpResponse::new(235, "2.7.0 Authentication successful"),
            mail_from_response: SmtpResponse::new(250, "2.1.0 OK"),
            rcpt_to_response: SmtpResponse::new(250, "2.1.5 OK"),
            data_response: SmtpResponse::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end_response: SmtpResponse::new(250, "2.0.0 OK: queued"),
            quit_response: SmtpResponse::new(221, "2.0.0 Bye"),
            drop_after_commands: None,
            silent_on_command: None,
            tls: false,
        }
    }
}

/// Where the relay is in `AUTH LOGIN`.
#[derive(Clone, Copy)]
enum AuthStep {
    None,
    Username,
    Password,
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client<S>(
        stream: S,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut command_count = 0;
        let mut auth = AuthStep::None;

        writer.write_all(&config.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();

            if let Some(drop_after) = config.drop_after_commands
                && command_count >= drop_after
            {
                return Ok(());
            }

            let read_result = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await;
            let Ok(bytes_read) = read_result else {
                return Ok(());
            };
            if bytes_read? == 0 {
                return Ok(());
            }

            let cmd_line = line.trim().to_string();
            tracing::debug!("Mock server received: {}", cmd_line);

            if config.silent_on_command == Some(command_count) {
                commands.write().await.push(SmtpCommand::Other(cmd_line));
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }
            command_count += 1;

            let (response, smtp_cmd) = match auth {
                AuthStep::Username => {
                    auth = AuthStep::Password;
                    (
                        config.username_response.clone(),
                        SmtpCommand::Credential(cmd_line),
                    )
                }
                AuthStep::Password => {
                    auth = AuthStep::None;
                    (
                        config.password_response.clone(),
                        SmtpCommand::Credential(cmd_line),
                    )
                }
                AuthStep::None => {
                    let parts: Vec<&str> = cmd_line.splitn(2, ' ').collect();
                    let argument = parts.get(1).unwrap_or(&"").to_string();

                    match parts[0].to_uppercase().as_str() {
                        "HELO" => (config.helo_response.clone(), SmtpCommand::Helo(argument)),
                        "AUTH" if argument.eq_ignore_ascii_case("LOGIN") => {
                            if config.auth_response.code == 334 {
                                auth = AuthStep::Username;
                            }
                            (config.auth_response.clone(), SmtpCommand::AuthLogin)
                        }
                        "MAIL" => (
                            config.mail_from_response.clone(),
                            SmtpCommand::MailFrom(argument),
                        ),
                        "RCPT" => (
                            config.rcpt_to_response.clone(),
                            SmtpCommand::RcptTo(argument),
                        ),
                        "DATA" => (config.data_response.clone(), SmtpCommand::Data),
                        "QUIT" => {
                            commands.write().await.push(SmtpCommand::Quit);
                            writer.write_all(&config.quit_response.to_bytes()).await?;
                            writer.flush().await?;
                            return Ok(());
                        }
                        _ => (
                            SmtpResponse::new(500, "Unknown command"),
                            SmtpCommand::Other(cmd_line.clone()),
                        ),
                    }
                }
            };

            commands.write().await.push(smtp_cmd.clone());
            writer.write_all(&response.to_bytes()).await?;
            writer.flush().await?;

            if smtp_cmd == SmtpCommand::Data && response.code == 354 {
                let mut content = String::new();
                let mut data_line = String::new();

                loop {
                    data_line.clear();
                    if reader.read_line(&mut data_line).await? == 0 {
                        return Ok(());
                    }

                    if data_line.trim_end() == "." {
                        commands
                            .write()
                            .await
                            .push(SmtpCommand::MessageContent(content));
                        writer
                            .write_all(&config.data_end_response.to_bytes())
                            .await?;
                        writer.flush().await?;
                        break;
                    }

                    content.push_str(&data_line);
                }
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_helo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.helo_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_password_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.password_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_quit_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.quit_response = SmtpResponse::new(code, message);
        self
    }

    /// Hang up after N commands
    #[must_use]
    pub const fn with_network_error_after_commands(mut self, count: usize) -> Self {
        self.config.drop_after_commands = Some(count);
        self
    }

    /// Never answer the Nth command (0-indexed)
    #[must_use]
    pub const fn with_silence_on_command(mut self, command_index: usize) -> Self {
        self.config.silent_on_command = Some(command_index);
        self
    }

    /// Wrap every connection in TLS, as an implicit-TLS relay would.
    #[must_use]
    pub const fn with_tls(mut self) -> Self {
        self.config.tls = true;
        self
    }

    /// Bind to a free local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let acceptor = if self.config.tls {
            Some(self_signed_acceptor()?)
        } else {
            None
        };
        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let commands_clone = Arc::clone(&commands);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands_clone);
                    let acceptor = acceptor.clone();

                    tokio::spawn(async move {
                        let result = match acceptor {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(stream) => {
                                    MockSmtpServer::handle_client(stream, config, commands).await
                                }
                                Err(e) => Err(e.into()),
                            },
                            None => MockSmtpServer::handle_client(stream, config, commands).await,
                        };

                        if let Err(e) = result {
                            tracing::debug!("Mock server client error: {}", e);
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            shutdown,
        })
    }
}

/// A TLS acceptor presenting a throwaway certificate for `localhost`.
fn self_signed_acceptor() -> Result<TlsAcceptor, std::io::Error> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(std::io::Error::other)?;
    let cert_der = CertificateDer::from(cert.serialize_der().map_err(std::io::Error::other)?);
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        cert.serialize_private_key_der(),
    ));

    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(std::io::Error::other)?
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .map_err(std::io::Error::other)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
