//! Pollable client for authenticated SMTP submission.
//!
//! Built for callers that run their own loop and cannot park a thread on a
//! socket: each [`Sender::poll`] does at most one step of the dialogue.
//!
//! ```no_run
//! use postie_common::config::{SenderConfig, ServerCredentials};
//! use postie_smtp::{Message, Sender};
//!
//! let mut sender = Sender::new(SenderConfig::default());
//! sender.configure(ServerCredentials::new("user", "secret", "smtp.example.com", 465));
//!
//! let status = sender.send_blocking(Message::new(
//!     "sensor@example.com",
//!     "ops@example.com",
//!     "Reading",
//!     "Temperature is 21C",
//! ));
//! println!("{status}");
//! ```

pub mod clock;
pub mod error;
pub mod message;
pub mod response;
pub mod sender;
pub mod state;
pub mod status;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SubmitError;
pub use message::Message;
pub use response::{Reply, ResponseWaiter, Wait};
pub use sender::Sender;
pub use state::State;
pub use status::{Code, Status, TransferResult};
pub use transport::{Connector, PlainConnector, TlsConnector, Transport, TransportError};
