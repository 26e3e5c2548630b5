//! Test utilities.
//!
//! [`CaptureSink`] records what the dispatcher flushed so tests can
//! assert on the final response without a real transport.

use std::io;

use crate::response::{ResponseSink, StatusCode};

/// A [`ResponseSink`] that captures the response in memory.
///
/// Also counts sink invocations so tests can verify the at-most-once
/// contract.
#[derive(Debug, Default)]
pub struct CaptureSink {
    status: Option<StatusCode>,
    body: Vec<u8>,
    status_calls: usize,
    body_calls: usize,
}

impl CaptureSink {
    /// Create an empty capture sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured status code, if one was set.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The captured body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The captured body as UTF-8 text (lossy).
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// How many times `set_status` was invoked.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.status_calls
    }

    /// How many times `write_body` was invoked.
    #[must_use]
    pub fn body_calls(&self) -> usize {
        self.body_calls
    }
}

impl ResponseSink for CaptureSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status_calls += 1;
        self.status = Some(status);
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.body_calls += 1;
        self.body.extend_from_slice(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_sink_records_response() {
        let mut sink = CaptureSink::new();
        sink.set_status(StatusCode::IM_A_TEAPOT);
        sink.write_body(b"short and stout").unwrap();
        assert_eq!(sink.status(), Some(StatusCode::IM_A_TEAPOT));
        assert_eq!(sink.body_text(), "short and stout");
        assert_eq!(sink.status_calls(), 1);
        assert_eq!(sink.body_calls(), 1);
    }
}
