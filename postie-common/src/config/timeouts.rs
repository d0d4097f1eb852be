//! Reply deadlines for the submission dialogue.
//!
//! Every wait for a server reply is bounded. The deadline that applies
//! depends on what the relay is being asked to do:
//! - **connect**: TCP connect and, for implicit TLS, the handshake
//! - **command**: greeting, HELO, AUTH and envelope replies
//! - **data**: the final acknowledgement after the terminating dot
//! - **quit**: the closing 221, which never fails a transfer

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side deadlines, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// Timeout for establishing the connection (and TLS handshake).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for each command reply up to and including `DATA`'s 354.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Timeout for the reply to the end-of-data dot.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,

    /// Timeout for the reply to `QUIT`.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::quit_secs")]
    pub quit_secs: u64,
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }

    #[must_use]
    pub const fn quit(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
            quit_secs: defaults::quit_secs(),
        }
    }
}

mod defaults {
    pub const fn connect_secs() -> u64 {
        30
    }
    pub const fn command_secs() -> u64 {
        10
    }
    pub const fn data_secs() -> u64 {
        60
    }
    pub const fn quit_secs() -> u64 {
        10
    }
}
