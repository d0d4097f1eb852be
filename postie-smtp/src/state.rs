use core::fmt::{self, Display, Formatter};
use std::time::Duration;

use postie_common::config::ClientTimeouts;

/// Where the submission dialogue stands.
///
/// Every waiting state was entered by sending a command, and stays until the
/// reply to that command arrives, turns out wrong, or takes too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Opening the transport.
    Connect,
    /// Waiting for the 220 greeting.
    Greet,
    /// `HELO` sent.
    Helo,
    /// `AUTH LOGIN` sent.
    Auth,
    /// Login sent.
    User,
    /// Password sent.
    Password,
    /// `MAIL FROM` sent.
    From,
    /// `RCPT TO` sent.
    To,
    /// `DATA` sent.
    Data,
    /// Message and terminating dot sent.
    SendMessage,
    /// `QUIT` sent.
    SendOk,
    /// Releasing the transport.
    Quit,
    /// The transfer failed.
    Error,
    /// A reply did not arrive in time.
    Timeout,
}

impl State {
    /// Whether a transfer is in flight, which blocks new submissions.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        !matches!(self, Self::Idle | Self::Error | Self::Timeout)
    }

    /// Reply code that lets the dialogue move on from this state.
    #[must_use]
    pub const fn expected_reply(self) -> Option<u16> {
        match self {
            Self::Greet => Some(220),
            Self::Helo | Self::From | Self::To | Self::SendMessage => Some(250),
            Self::Auth | Self::User => Some(334),
            Self::Password => Some(235),
            Self::Data => Some(354),
            Self::SendOk => Some(221),
            Self::Idle | Self::Connect | Self::Quit | Self::Error | Self::Timeout => None,
        }
    }

    /// The state entered once this one is done with.
    ///
    /// Terminal states and `Idle` map to themselves.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Connect => Self::Greet,
            Self::Greet => Self::Helo,
            Self::Helo => Self::Auth,
            Self::Auth => Self::User,
            Self::User => Self::Password,
            Self::Password => Self::From,
            Self::From => Self::To,
            Self::To => Self::Data,
            Self::Data => Self::SendMessage,
            Self::SendMessage => Self::SendOk,
            Self::SendOk => Self::Quit,
            Self::Quit => Self::Idle,
            Self::Idle | Self::Error | Self::Timeout => self,
        }
    }

    /// How long the relay has to answer in this state.
    #[must_use]
    pub const fn reply_timeout(self, timeouts: &ClientTimeouts) -> Duration {
        match self {
            Self::SendMessage => timeouts.data(),
            Self::SendOk => timeouts.quit(),
            _ => timeouts.command(),
        }
    }

    /// What a [`Self::Timeout`] reached from this state reports.
    #[must_use]
    pub const fn timeout_description(self) -> &'static str {
        match self {
            Self::Greet => "No server greeting",
            Self::Helo => "No HELO reply",
            _ => "timeout",
        }
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Idle => "Idle",
            Self::Connect => "Connect",
            Self::Greet => "Greet",
            Self::Helo => "HELO",
            Self::Auth => "AUTH",
            Self::User => "User",
            Self::Password => "Password",
            Self::From => "MAIL",
            Self::To => "RCPT",
            Self::Data => "DATA",
            Self::SendMessage => "SendMessage",
            Self::SendOk => "QUIT",
            Self::Quit => "Quit",
            Self::Error => "Error",
            Self::Timeout => "Timeout",
        })
    }
}
