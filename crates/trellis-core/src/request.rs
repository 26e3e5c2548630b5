//! HTTP request types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
}

impl Method {
    /// The canonical upper-case token for this method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method token is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMethod {
    token: String,
}

impl InvalidMethod {
    /// The rejected token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for InvalidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid HTTP method: {:?}", self.token)
    }
}

impl std::error::Error for InvalidMethod {}

impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            _ => Err(InvalidMethod {
                token: s.to_string(),
            }),
        }
    }
}

/// HTTP headers collection.
///
/// Header names are stored lower-cased; lookups are case-insensitive.
#[derive(Debug, Default)]
pub struct Headers {
    inner: HashMap<String, Vec<u8>>,
}

impl Headers {
    /// Create empty headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Get a header value as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Insert a header, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Iterate over all headers as (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.inner
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Request body.
#[derive(Debug)]
pub enum Body {
    /// Empty body.
    Empty,
    /// Fully-buffered bytes.
    Bytes(Vec<u8>),
}

impl Body {
    /// Borrow the body bytes (empty slice for [`Body::Empty`]).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Bytes(b) => b.as_slice(),
        }
    }

    /// Get body as bytes, consuming it.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Empty => Vec::new(),
            Self::Bytes(b) => b,
        }
    }

    /// Check if body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty) || matches!(self, Self::Bytes(b) if b.is_empty())
    }
}

/// HTTP request.
///
/// Carries everything the dispatcher and handlers need: method, path,
/// query string, host, headers, and the buffered body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    host: String,
    headers: Headers,
    body: Body,
}

impl Request {
    /// Create a new request with an empty body and no headers.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            host: String::new(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Get the HTTP method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get the request path (without the query string).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the raw query string (without the leading `?`).
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Get the request host (from the `Host` header; empty if absent).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Take the body, replacing it with [`Body::Empty`].
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }

    /// Set the body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Set the query string.
    pub fn set_query(&mut self, query: Option<String>) {
        self.query = query;
    }

    /// Set the host.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_str() {
        for method in [
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Options,
            Method::Trace,
        ] {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn method_rejects_unknown_token() {
        let err = "BREW".parse::<Method>().unwrap_err();
        assert_eq!(err.token(), "BREW");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", b"application/json".to_vec());
        assert_eq!(headers.get("content-type"), Some(&b"application/json"[..]));
        assert_eq!(headers.get_str("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn body_empty_and_bytes() {
        assert!(Body::Empty.is_empty());
        assert!(Body::Bytes(Vec::new()).is_empty());
        let body = Body::Bytes(b"abc".to_vec());
        assert!(!body.is_empty());
        assert_eq!(body.as_bytes(), b"abc");
        assert_eq!(body.into_bytes(), b"abc".to_vec());
    }

    #[test]
    fn request_accessors() {
        let mut req = Request::new(Method::Get, "/user/42");
        req.set_query(Some("page=2".to_string()));
        req.set_host("example.com");
        req.set_body(Body::Bytes(b"{}".to_vec()));
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/user/42");
        assert_eq!(req.query(), Some("page=2"));
        assert_eq!(req.host(), "example.com");
        assert_eq!(req.take_body().into_bytes(), b"{}".to_vec());
        assert!(req.body().is_empty());
    }
}
