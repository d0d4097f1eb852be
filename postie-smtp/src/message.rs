//! The message handed to the engine, and how it is written after `DATA`.

use std::fmt::Write;

use chrono::{DateTime, TimeZone, Utc};
use postie_common::config::BodyFormat;

use crate::error::SubmitError;

/// A single message for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Written out as the `Date` header.
    pub date: DateTime<Utc>,
}

impl Message {
    /// Creates a message dated now.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            date: Utc::now(),
        }
    }

    /// Sets the date, converting it to UTC.
    #[must_use]
    pub fn dated<Tz: TimeZone>(mut self, date: &DateTime<Tz>) -> Self {
        self.date = date.with_timezone(&Utc);
        self
    }

    /// Checks the fields copied verbatim into commands and headers.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::InvalidMessage`] naming the first of `from`,
    /// `to` or `subject` that holds a CR or LF.
    pub fn validate(&self) -> Result<(), SubmitError> {
        for (field, value) in [
            ("from", &self.from),
            ("to", &self.to),
            ("subject", &self.subject),
        ] {
            if value.contains(['\r', '\n']) {
                return Err(SubmitError::InvalidMessage { field });
            }
        }
        Ok(())
    }

    /// Renders headers and body as sent after the relay's 354.
    ///
    /// Lines are CRLF terminated and body lines starting with `.` are
    /// dot-stuffed. The terminating `.` line is not included.
    #[must_use]
    pub fn render(&self, format: BodyFormat) -> String {
        let mut message = String::with_capacity(256 + self.body.len());

        let _ = write!(message, "From: {}\r\n", self.from);
        let _ = write!(message, "To: {}\r\n", self.to);
        let _ = write!(message, "Subject: {}\r\n", self.subject);
        let _ = write!(message, "Date: {}\r\n", self.date.to_rfc2822());

        match format {
            BodyFormat::Plain => {
                message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
                message.push_str("\r\n");
                push_body(&mut message, &self.body);
            }
            BodyFormat::Html => {
                message.push_str("Mime-Version: 1.0\r\n");
                message.push_str("Content-Type: text/html; charset=\"UTF-8\"\r\n");
                message.push_str("Content-Transfer-Encoding: 7bit\r\n");
                message.push_str("\r\n");
                message.push_str("<!DOCTYPE html><html lang=\"en\">\r\n");
                push_body(&mut message, &self.body);
                message.push_str("</html>\r\n");
            }
        }

        message
    }
}

/// Append `body` with CRLF line endings and leading dots doubled.
fn push_body(message: &mut String, body: &str) {
    for line in body.lines() {
        if line.starts_with('.') {
            message.push('.');
        }
        message.push_str(line);
        message.push_str("\r\n");
    }
}

/// Wrap an envelope address in angle brackets unless it already is.
pub(crate) fn envelope_path(address: &str) -> String {
    let address = address.trim();
    if address.starts_with('<') && address.ends_with('>') {
        address.to_string()
    } else {
        format!("<{address}>")
    }
}
