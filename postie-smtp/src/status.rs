use core::fmt::{self, Display, Formatter};

/// Where a transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    Pending,
    Success,
    Failure,
}

/// The code attached to a [`Status`].
///
/// Either the last reply code read from the relay, or one of the conditions
/// the engine reports before (or instead of) hearing from it. The numeric
/// form of those conditions is negative so that it never collides with a
/// reply code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Code {
    Reply(u16),
    Uninitialized,
    AlreadyInProgress,
    ConnectionFailed,
    Timeout,
    InvalidMessage,
}

impl Code {
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            #[allow(
                clippy::cast_possible_wrap,
                reason = "Reply::parse only yields three-digit codes"
            )]
            Self::Reply(code) => code as i16,
            Self::Uninitialized => -1,
            Self::AlreadyInProgress => -2,
            Self::ConnectionFailed => -3,
            Self::Timeout => -4,
            Self::InvalidMessage => -5,
        }
    }

    /// The reply code, if this came from the relay.
    #[must_use]
    pub const fn reply(self) -> Option<u16> {
        match self {
            Self::Reply(code) => Some(code),
            _ => None,
        }
    }

    /// Checks if the relay rejected permanently (5xx)
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self, Self::Reply(500..=599))
    }

    /// Checks if the relay rejected temporarily (4xx)
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::Reply(400..=499))
    }
}

impl From<u16> for Code {
    fn from(value: u16) -> Self {
        Self::Reply(value)
    }
}

impl From<Code> for i16 {
    fn from(value: Code) -> Self {
        value.as_i16()
    }
}

impl Display for Code {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Reply(code) => write!(fmt, "{code}"),
            Self::Uninitialized => fmt.write_str("uninitialized"),
            Self::AlreadyInProgress => fmt.write_str("already in progress"),
            Self::ConnectionFailed => fmt.write_str("connection failed"),
            Self::Timeout => fmt.write_str("timeout"),
            Self::InvalidMessage => fmt.write_str("invalid message"),
        }
    }
}

/// Outcome of the current or most recent transfer.
///
/// This is the only thing the engine exposes about a transfer, both while it
/// runs and after it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub result: TransferResult,
    pub code: Code,
    pub description: String,
}

impl Status {
    #[must_use]
    pub fn new(result: TransferResult, code: Code, description: impl Into<String>) -> Self {
        Self {
            result,
            code,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn failure(code: Code, description: impl Into<String>) -> Self {
        Self::new(TransferResult::Failure, code, description)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == TransferResult::Success
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.result == TransferResult::Failure
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.result == TransferResult::Pending
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::failure(Code::Uninitialized, "no transfer submitted")
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{:?} ({}): {}", self.result, self.code, self.description)
    }
}
