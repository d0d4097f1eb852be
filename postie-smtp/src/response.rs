//! Reading replies from the relay without blocking.

use std::time::{Duration, Instant};

use postie_common::incoming;

use crate::transport::{Transport, TransportError};

/// Longest reply line accepted, terminator included (RFC 5321 4.5.3.1.5).
pub const MAX_REPLY_LINE: usize = 512;

/// One reply line from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The three-digit reply code, or 0 when the line does not start with
    /// exactly three digits.
    pub code: u16,
    /// `false` for the `NNN-` lines of a multi-line reply.
    pub is_last: bool,
    /// The whole line, trimmed.
    pub text: String,
}

impl Reply {
    /// Parses a single line, without its terminator.
    ///
    /// Never fails: a line that does not start with exactly three digits
    /// has code 0.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let text = line.trim();
        let digits = text.bytes().take_while(u8::is_ascii_digit).count();
        let code = if digits == 3 {
            text[..3].parse().unwrap_or(0)
        } else {
            0
        };
        let is_last = text.as_bytes().get(3) != Some(&b'-');

        Self {
            code,
            is_last,
            text: text.to_string(),
        }
    }
}

/// What a single [`ResponseWaiter::poll`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    Matched(Reply),
    Mismatched(Reply),
    /// No complete reply yet, and time remains.
    Pending,
    /// The deadline passed without a complete reply.
    TimedOut,
}

/// Accumulates bytes from the relay across polls until a complete reply
/// line is available, or the deadline for it passes.
#[derive(Debug, Default)]
pub struct ResponseWaiter {
    buffer: Vec<u8>,
    deadline: Option<Instant>,
}

impl ResponseWaiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks once for the reply to the last command.
    ///
    /// The first call of a wait fixes the deadline at `now + timeout`; it is
    /// forgotten again once anything other than [`Wait::Pending`] is
    /// returned. Bytes past the reply stay buffered for the next wait.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when it fails or closes and no complete
    /// line was already buffered, and [`TransportError::LineTooLong`] once
    /// more than [`MAX_REPLY_LINE`] bytes arrive without a line break.
    pub fn poll(
        &mut self,
        transport: &mut dyn Transport,
        expected: u16,
        timeout: Duration,
        now: Instant,
    ) -> Result<Wait, TransportError> {
        let deadline = *self.deadline.get_or_insert(now + timeout);
        let drained = self.fill(transport);

        while let Some(reply) = self.next_line() {
            if !reply.is_last {
                incoming!("{}", reply.text);
                continue;
            }

            incoming!(level = DEBUG, "{}", reply.text);
            self.deadline = None;

            return Ok(if reply.code == expected {
                Wait::Matched(reply)
            } else {
                Wait::Mismatched(reply)
            });
        }

        if let Err(err) = drained {
            self.deadline = None;
            return Err(err);
        }

        if self.buffer.len() > MAX_REPLY_LINE {
            self.reset();
            return Err(TransportError::LineTooLong(MAX_REPLY_LINE));
        }

        if now >= deadline {
            self.deadline = None;
            return Ok(Wait::TimedOut);
        }

        Ok(Wait::Pending)
    }

    /// Drops buffered bytes and any running deadline.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.deadline = None;
    }

    /// Read what is available right now, stopping early once a full line's
    /// worth is buffered so a chatty relay cannot hold up the poll.
    fn fill(&mut self, transport: &mut dyn Transport) -> Result<(), TransportError> {
        let mut chunk = [0; 512];
        while self.buffer.len() < MAX_REPLY_LINE {
            match transport.read_available(&mut chunk)? {
                0 => return Ok(()),
                read => self.buffer.extend_from_slice(&chunk[..read]),
            }
        }
        Ok(())
    }

    /// Take the next complete, non-blank line off the front of the buffer.
    fn next_line(&mut self) -> Option<Reply> {
        loop {
            let end = self
                .buffer
                .iter()
                .position(|&byte| byte == b'\r' || byte == b'\n')?;
            let terminator = self.buffer[end..]
                .iter()
                .take_while(|&&byte| byte == b'\r' || byte == b'\n')
                .count();

            let line: Vec<u8> = self.buffer.drain(..end + terminator).take(end).collect();
            let line = String::from_utf8_lossy(&line);

            if !line.trim().is_empty() {
                return Some(Reply::parse(&line));
            }
        }
    }
}
