//! Reasons a message is turned away before any network activity.

use thiserror::Error;

use crate::status::Code;

/// Why [`crate::Sender::try_submit`] refused a message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// No credentials have been configured yet.
    #[error("configure() not called")]
    Uninitialized,

    /// Another transfer is still in flight.
    #[error("Transfer already in progress")]
    AlreadyInProgress,

    /// A field that is written into a command or header holds a line break.
    #[error("{field} contains a line break")]
    InvalidMessage { field: &'static str },
}

impl SubmitError {
    /// The status code reported for this refusal.
    #[must_use]
    pub const fn code(self) -> Code {
        match self {
            Self::Uninitialized => Code::Uninitialized,
            Self::AlreadyInProgress => Code::AlreadyInProgress,
            Self::InvalidMessage { .. } => Code::InvalidMessage,
        }
    }
}
