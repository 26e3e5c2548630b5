//! HTTP response serialization.

use std::io::{self, Write};

use trellis_core::{ResponseSink, StatusCode};

/// Serializes responses into a reusable buffer.
pub struct ResponseWriter {
    buffer: Vec<u8>,
}

impl ResponseWriter {
    /// Create a new response writer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Serialize a complete response.
    ///
    /// Emits the status line, `content-length`, and `connection: close`
    /// (each response closes its connection), then the body.
    #[must_use]
    pub fn write(&mut self, status: StatusCode, body: &[u8]) -> Vec<u8> {
        self.buffer.clear();

        // Status line
        self.buffer.extend_from_slice(b"HTTP/1.1 ");
        self.buffer
            .extend_from_slice(status.as_u16().to_string().as_bytes());
        self.buffer.extend_from_slice(b" ");
        self.buffer
            .extend_from_slice(status.canonical_reason().as_bytes());
        self.buffer.extend_from_slice(b"\r\n");

        // Headers
        self.buffer.extend_from_slice(b"content-length: ");
        self.buffer
            .extend_from_slice(body.len().to_string().as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
        self.buffer.extend_from_slice(b"connection: close\r\n");

        // End of headers, then body
        self.buffer.extend_from_slice(b"\r\n");
        self.buffer.extend_from_slice(body);

        self.take_buffer()
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        std::mem::swap(&mut out, &mut self.buffer);
        self.buffer = Vec::with_capacity(out.capacity());
        out
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`ResponseSink`] that serializes onto any [`Write`] target.
///
/// `set_status` stages the code; `write_body` serializes the whole
/// response and completes it. A second `write_body` is a caller error
/// and is refused without touching the wire again.
pub struct HttpSink<W: Write> {
    writer: ResponseWriter,
    out: W,
    status: StatusCode,
    responded: bool,
}

impl<W: Write> HttpSink<W> {
    /// Create a sink writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            writer: ResponseWriter::new(),
            out,
            status: StatusCode::OK,
            responded: false,
        }
    }

    /// Whether a response has been written.
    #[must_use]
    pub fn has_responded(&self) -> bool {
        self.responded
    }

    /// Consume the sink, returning the write target.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResponseSink for HttpSink<W> {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        if self.responded {
            return Err(io::Error::other("response already written"));
        }
        self.responded = true;
        let bytes = self.writer.write(self.status, body);
        self.out.write_all(&bytes)?;
        self.out.flush()
    }
}
