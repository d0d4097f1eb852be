//! The submission engine.
//!
//! A [`Sender`] walks one message at a time through the client side of an
//! authenticated SMTP submission:
//!
//! ```text
//! Connect → Greet → Helo → Auth → User → Password → From → To → Data
//!         → SendMessage → SendOk → Quit → Idle
//! ```
//!
//! Each call to [`Sender::poll`] makes one attempt at the next transition and
//! returns without waiting for the relay. Callers either drive it from their
//! own loop, or use [`Sender::send_blocking`] / [`Sender::send`].
//!
//! Any unexpected reply, expired deadline or transport failure ends the
//! transfer in [`State::Error`] or [`State::Timeout`]; nothing is retried.

use std::{sync::Arc, thread};

use base64::{Engine, engine::general_purpose::STANDARD};
use postie_common::{
    config::{SenderConfig, ServerCredentials},
    internal, outgoing,
};

use crate::{
    clock::{Clock, SystemClock},
    error::SubmitError,
    message::{Message, envelope_path},
    response::{ResponseWaiter, Wait},
    state::State,
    status::{Code, Status, TransferResult},
    transport::{Connector, Transport, TransportError, connector_for},
};

/// Everything needed to resume a transfer on the next poll.
#[derive(Default)]
struct Transfer {
    state: State,
    message: Option<Message>,
    credentials: Option<Arc<ServerCredentials>>,
    transport: Option<Box<dyn Transport>>,
    waiter: ResponseWaiter,
}

impl Transfer {
    fn new(message: Message, credentials: Arc<ServerCredentials>) -> Self {
        Self {
            state: State::Connect,
            message: Some(message),
            credentials: Some(credentials),
            transport: None,
            waiter: ResponseWaiter::new(),
        }
    }
}

/// Pollable SMTP submission client.
pub struct Sender<C: Clock = SystemClock> {
    config: SenderConfig,
    connector: Box<dyn Connector>,
    clock: C,
    credentials: Option<Arc<ServerCredentials>>,
    status: Status,
    transfer: Transfer,
}

impl Sender<SystemClock> {
    /// Creates an engine using the transport named in `config`.
    #[must_use]
    pub fn new(config: SenderConfig) -> Self {
        let connector = connector_for(config.transport, &config.tls);
        Self::with_connector(config, connector)
    }

    /// Creates an engine that opens connections through `connector`.
    #[must_use]
    pub fn with_connector(config: SenderConfig, connector: Box<dyn Connector>) -> Self {
        Self::with_clock(config, connector, SystemClock)
    }
}

impl<C: Clock> Sender<C> {
    #[must_use]
    pub fn with_clock(config: SenderConfig, connector: Box<dyn Connector>, clock: C) -> Self {
        Self {
            config,
            connector,
            clock,
            credentials: None,
            status: Status::default(),
            transfer: Transfer::default(),
        }
    }

    /// Sets the relay and login used by transfers submitted from now on.
    pub fn configure(&mut self, credentials: ServerCredentials) {
        internal!(
            level = DEBUG,
            "Configured relay {}:{} for {}",
            credentials.host,
            credentials.port,
            credentials.login
        );
        self.credentials = Some(Arc::new(credentials));
    }

    /// Accepts `message` for delivery if nothing else is in flight.
    ///
    /// Nothing touches the network until the next [`Self::poll`].
    ///
    /// # Errors
    ///
    /// - [`SubmitError::AlreadyInProgress`] while a transfer is in flight.
    ///   The running transfer and its status are left alone.
    /// - [`SubmitError::Uninitialized`] when [`Self::configure`] has not been
    ///   called. The status reports the same.
    /// - [`SubmitError::InvalidMessage`] when the sender, recipient or subject
    ///   holds a line break. The status reports the same.
    #[tracing::instrument(level = "debug", skip_all, fields(to = %message.to))]
    pub fn try_submit(&mut self, message: Message) -> Result<(), SubmitError> {
        if self.is_busy() {
            internal!(
                level = WARN,
                "Rejecting message, transfer in {} state",
                self.transfer.state
            );
            return Err(SubmitError::AlreadyInProgress);
        }

        let Some(credentials) = self.credentials.clone() else {
            let error = SubmitError::Uninitialized;
            self.status = Status::failure(error.code(), error.to_string());
            return Err(error);
        };

        if let Err(error) = message.validate() {
            internal!(level = WARN, "Rejecting message: {error}");
            self.status = Status::failure(error.code(), error.to_string());
            return Err(error);
        }

        self.transfer = Transfer::new(message, credentials);
        self.status = Status::new(TransferResult::Pending, Code::Uninitialized, "submitted");

        Ok(())
    }

    /// [`Self::try_submit`], reporting only whether the message was accepted.
    pub fn submit(&mut self, message: Message) -> bool {
        self.try_submit(message).is_ok()
    }

    /// Makes one attempt to move the transfer forward.
    ///
    /// Does nothing when no transfer is in flight. Never waits for the relay;
    /// the only blocking work is opening the connection and writing a
    /// command or the message itself.
    pub fn poll(&mut self) {
        match self.transfer.state {
            State::Idle | State::Error | State::Timeout => {}
            State::Connect => self.connect(),
            State::Quit => self.complete(),
            waiting => self.await_reply(waiting),
        }
    }

    /// Submits `message` and polls until the transfer ends.
    ///
    /// A refused submission comes back as a failed status.
    pub fn send_blocking(&mut self, message: Message) -> Status {
        if let Err(e) = self.try_submit(message) {
            return Status::failure(e.code(), e.to_string());
        }

        loop {
            self.poll();
            if !self.is_busy() {
                break;
            }
            thread::sleep(self.config.poll_interval());
        }

        self.status.clone()
    }

    /// As [`Self::send_blocking`], sleeping on the tokio timer between polls.
    ///
    /// Each poll still performs its writes synchronously.
    pub async fn send(&mut self, message: Message) -> Status {
        if let Err(e) = self.try_submit(message) {
            return Status::failure(e.code(), e.to_string());
        }

        loop {
            self.poll();
            if !self.is_busy() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        self.status.clone()
    }

    #[must_use]
    pub const fn current_status(&self) -> &Status {
        &self.status
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.transfer.state
    }

    /// Whether a transfer is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.transfer.state.is_in_flight()
    }

    fn connect(&mut self) {
        let Some(credentials) = self.transfer.credentials.clone() else {
            self.fail(State::Error, Code::Uninitialized, "configure() not called");
            return;
        };

        internal!(
            level = DEBUG,
            "Connecting to {}:{} ({})",
            credentials.host,
            credentials.port,
            self.connector.name()
        );

        match self.connector.connect(&credentials, &self.config.timeouts) {
            Ok(transport) => {
                self.transfer.transport = Some(transport);
                self.transfer.state = State::Greet;
            }
            Err(e) => self.fail(
                State::Error,
                Code::ConnectionFailed,
                format!("No connection to SMTP server: {e}"),
            ),
        }
    }

    fn await_reply(&mut self, state: State) {
        let Some(expected) = state.expected_reply() else {
            return;
        };

        let timeout = state.reply_timeout(&self.config.timeouts);
        let now = self.clock.now();
        let Transfer {
            transport, waiter, ..
        } = &mut self.transfer;

        let result = match transport.as_deref_mut() {
            Some(transport) => waiter.poll(transport, expected, timeout, now),
            None => Err(TransportError::ConnectionClosed),
        };

        match result {
            Ok(Wait::Pending) => {}
            Ok(Wait::Matched(reply)) => {
                self.status.code = Code::Reply(reply.code);
                self.status.description = reply.text;
                self.advance(state.next());
            }
            // The message was accepted before QUIT; nothing here changes that.
            Ok(Wait::Mismatched(reply)) if state == State::SendOk => {
                internal!(level = DEBUG, "Unexpected reply to QUIT: {}", reply.text);
                self.status.code = Code::Reply(reply.code);
                self.status.description = reply.text;
                self.transfer.state = State::Quit;
            }
            Ok(Wait::TimedOut) | Err(_) if state == State::SendOk => {
                internal!(level = DEBUG, "No reply to QUIT, closing anyway");
                self.transfer.state = State::Quit;
            }
            Ok(Wait::Mismatched(reply)) => {
                internal!(
                    level = WARN,
                    "Expected {expected} in {state} state, relay replied: {}",
                    reply.text
                );
                self.fail(State::Error, Code::Reply(reply.code), reply.text);
            }
            Ok(Wait::TimedOut) => {
                internal!(level = WARN, "No reply in {state} state within {timeout:?}");
                self.fail(State::Timeout, Code::Timeout, state.timeout_description());
            }
            Err(e) => self.fail(State::Error, Code::ConnectionFailed, e.to_string()),
        }
    }

    /// Send the command that opens `next`, then move into it.
    fn advance(&mut self, next: State) {
        if let Err(e) = self.enter(next) {
            if next == State::SendOk {
                // The relay already took the message.
                internal!(level = DEBUG, "Could not send QUIT, closing anyway: {e}");
                self.transfer.state = State::Quit;
            } else {
                self.fail(State::Error, Code::ConnectionFailed, e.to_string());
            }
            return;
        }

        self.transfer.state = if next == State::SendOk && !self.config.wait_for_goodbye {
            State::Quit
        } else {
            next
        };
    }

    fn enter(&mut self, next: State) -> Result<(), TransportError> {
        let Transfer {
            message,
            credentials,
            transport,
            ..
        } = &mut self.transfer;

        let (Some(message), Some(credentials), Some(transport)) =
            (message.as_ref(), credentials.as_deref(), transport.as_deref_mut())
        else {
            return Err(TransportError::ConnectionClosed);
        };

        match next {
            State::Helo => command(transport, &format!("HELO {}", self.config.client_name)),
            State::Auth => command(transport, "AUTH LOGIN"),
            State::User => secret(transport, &credentials.login),
            State::Password => secret(transport, &credentials.password),
            State::From => command(
                transport,
                &format!("MAIL FROM:{}", envelope_path(&message.from)),
            ),
            State::To => command(transport, &format!("RCPT TO:{}", envelope_path(&message.to))),
            State::Data => command(transport, "DATA"),
            State::SendMessage => {
                let payload = message.render(self.config.body_format);
                outgoing!("<message, {} bytes>", payload.len());
                transport.write_all(payload.as_bytes())?;
                transport.flush()?;
                command(transport, ".")
            }
            State::SendOk => command(transport, "QUIT"),
            _ => Ok(()),
        }
    }

    fn complete(&mut self) {
        self.release();
        self.transfer.state = State::Idle;
        self.status.result = TransferResult::Success;
        internal!(level = INFO, "Message delivered: {}", self.status);
    }

    fn fail(&mut self, state: State, code: Code, description: impl Into<String>) {
        self.release();
        self.transfer.state = state;
        self.status = Status::failure(code, description);
        internal!(level = WARN, "Transfer failed: {}", self.status);
    }

    /// Close the transport if the transfer still holds one.
    fn release(&mut self) {
        if let Some(mut transport) = self.transfer.transport.take() {
            if let Err(e) = transport.close() {
                internal!(level = DEBUG, "Error closing transport: {e}");
            }
        }

        self.transfer.waiter.reset();
        self.transfer.message = None;
    }
}

impl<C: Clock> Drop for Sender<C> {
    fn drop(&mut self) {
        self.release();
    }
}

fn command(transport: &mut dyn Transport, line: &str) -> Result<(), TransportError> {
    outgoing!(level = DEBUG, "{line}");
    transport.write_line(line)
}

/// Base64 for `AUTH LOGIN`, never logged in clear.
fn secret(transport: &mut dyn Transport, value: &str) -> Result<(), TransportError> {
    outgoing!(level = DEBUG, "<redacted>");
    transport.write_line(&STANDARD.encode(value))
}
