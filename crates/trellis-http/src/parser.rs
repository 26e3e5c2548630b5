//! HTTP/1.1 request head parsing.
//!
//! The parser works on a growing byte buffer: callers feed it whatever
//! has been read so far and get back either a complete
//! [`Request`](trellis_core::Request) with the number of bytes consumed,
//! or [`ParseStatus::Partial`] meaning more bytes are needed. Only
//! `Content-Length` bodies are supported.

use std::fmt;

use memchr::{memchr, memmem};
use trellis_core::{Body, Method, Request};

/// Default maximum request head size (16KB).
pub const DEFAULT_MAX_HEAD_SIZE: usize = 16 * 1024;

/// Default maximum body size (1MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Size limits enforced while parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    max_head_size: usize,
    max_body_size: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ParseLimits {
    /// Create limits with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum head size.
    #[must_use]
    pub fn with_max_head_size(mut self, size: usize) -> Self {
        self.max_head_size = size;
        self
    }

    /// Set the maximum body size.
    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// The maximum head size.
    #[must_use]
    pub fn max_head_size(&self) -> usize {
        self.max_head_size
    }

    /// The maximum body size.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

/// Parse failure.
#[derive(Debug)]
pub enum ParseError {
    /// The head exceeds the configured limit.
    HeadTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// The limit.
        max: usize,
    },
    /// The declared body exceeds the configured limit.
    BodyTooLarge {
        /// Declared content length.
        size: usize,
        /// The limit.
        max: usize,
    },
    /// The request line is malformed.
    InvalidRequestLine,
    /// The method token is not recognized.
    UnsupportedMethod {
        /// The rejected token.
        token: String,
    },
    /// Not an HTTP/1.x request.
    UnsupportedVersion {
        /// The rejected version token.
        version: String,
    },
    /// A header line is malformed.
    InvalidHeader,
    /// The `Content-Length` value is not a number.
    InvalidContentLength,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeadTooLarge { size, max } => {
                write!(f, "request head too large: {size} bytes exceeds limit of {max}")
            }
            Self::BodyTooLarge { size, max } => {
                write!(f, "request body too large: {size} bytes exceeds limit of {max}")
            }
            Self::InvalidRequestLine => write!(f, "malformed request line"),
            Self::UnsupportedMethod { token } => write!(f, "unsupported method: {token:?}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported HTTP version: {version:?}")
            }
            Self::InvalidHeader => write!(f, "malformed header line"),
            Self::InvalidContentLength => write!(f, "invalid content-length value"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Outcome of one parse attempt.
#[derive(Debug)]
pub enum ParseStatus {
    /// A full request was parsed; the second field is the number of
    /// buffer bytes it consumed.
    Complete(Request, usize),
    /// The buffer does not yet hold a full request.
    Partial,
}

/// Try to parse one request from the front of `buf`.
pub fn parse_request(buf: &[u8], limits: &ParseLimits) -> Result<ParseStatus, ParseError> {
    let Some(head_end) = memmem::find(buf, b"\r\n\r\n") else {
        if buf.len() > limits.max_head_size {
            return Err(ParseError::HeadTooLarge {
                size: buf.len(),
                max: limits.max_head_size,
            });
        }
        return Ok(ParseStatus::Partial);
    };
    if head_end > limits.max_head_size {
        return Err(ParseError::HeadTooLarge {
            size: head_end,
            max: limits.max_head_size,
        });
    }

    let head = &buf[..head_end];
    let mut lines = split_lines(head);
    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let mut request = parse_request_line(request_line)?;

    for line in lines {
        let (name, value) = parse_header_line(line)?;
        request.headers_mut().insert(name, value);
    }
    let host = request.headers().get_str("host").map(str::to_string);
    if let Some(host) = host {
        request.set_host(host);
    }

    let content_length = match request.headers().get_str("content-length") {
        Some(text) => text
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?,
        None => 0,
    };
    if content_length > limits.max_body_size {
        return Err(ParseError::BodyTooLarge {
            size: content_length,
            max: limits.max_body_size,
        });
    }

    let body_start = head_end + 4;
    let needed = body_start + content_length;
    if buf.len() < needed {
        return Ok(ParseStatus::Partial);
    }
    if content_length > 0 {
        request.set_body(Body::Bytes(buf[body_start..needed].to_vec()));
    }
    Ok(ParseStatus::Complete(request, needed))
}

fn split_lines(head: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = head;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match memmem::find(rest, b"\r\n") {
            Some(idx) => {
                let line = &rest[..idx];
                rest = &rest[idx + 2..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = &[];
                Some(line)
            }
        }
    })
}

fn parse_request_line(line: &[u8]) -> Result<Request, ParseError> {
    let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequestLine)?;
    let mut parts = text.split_ascii_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    if !version.starts_with("HTTP/1.") {
        return Err(ParseError::UnsupportedVersion {
            version: version.to_string(),
        });
    }
    let method: Method = method.parse().map_err(|_| ParseError::UnsupportedMethod {
        token: method.to_string(),
    })?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (target, None),
    };
    let mut request = Request::new(method, path);
    request.set_query(query);
    Ok(request)
}

fn parse_header_line(line: &[u8]) -> Result<(String, Vec<u8>), ParseError> {
    let colon = memchr(b':', line).ok_or(ParseError::InvalidHeader)?;
    if colon == 0 {
        return Err(ParseError::InvalidHeader);
    }
    let name = std::str::from_utf8(&line[..colon]).map_err(|_| ParseError::InvalidHeader)?;
    if name.contains(' ') {
        return Err(ParseError::InvalidHeader);
    }
    let value = trim_bytes(&line[colon + 1..]);
    Ok((name.to_string(), value.to_vec()))
}

fn trim_bytes(mut bytes: &[u8]) -> &[u8] {
    while let Some((first, rest)) = bytes.split_first() {
        if *first == b' ' || *first == b'\t' {
            bytes = rest;
        } else {
            break;
        }
    }
    while let Some((last, rest)) = bytes.split_last() {
        if *last == b' ' || *last == b'\t' {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}
