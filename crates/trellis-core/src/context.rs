//! Per-request context.
//!
//! A [`Context`] is created by the dispatcher for exactly one request and
//! discarded after the response is flushed. It carries the request, the
//! path params extracted by the router, a staging area for the response
//! (status + body), and the transport's response sink.

use std::collections::HashMap;
use std::fmt;
use std::io;

use serde::de::DeserializeOwned;

use crate::query::{QueryString, form_decode};
use crate::request::Request;
use crate::response::{ResponseSink, StatusCode};

/// Error returned by [`Context::bind_json`].
#[derive(Debug)]
pub enum BindError {
    /// The request body is empty.
    EmptyBody,
    /// The body is not valid JSON for the target type.
    Json(serde_json::Error),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBody => write!(f, "request body is empty"),
            Self::Json(e) => write!(f, "invalid JSON body: {e}"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::EmptyBody => None,
        }
    }
}

impl From<serde_json::Error> for BindError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Request-scoped context handed to handlers and middleware.
pub struct Context<'a> {
    request: Request,
    params: HashMap<String, String>,
    matched_route: Option<String>,
    status: Option<StatusCode>,
    body: Vec<u8>,
    sink: &'a mut dyn ResponseSink,
    flushed: bool,
}

impl<'a> Context<'a> {
    /// Create a context for one request.
    ///
    /// Params and the matched route pattern are filled in by the
    /// dispatcher after route resolution.
    pub fn new(request: Request, sink: &'a mut dyn ResponseSink) -> Self {
        Self {
            request,
            params: HashMap::new(),
            matched_route: None,
            status: None,
            body: Vec::new(),
            sink,
            flushed: false,
        }
    }

    /// The inbound request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access to the inbound request.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Replace the extracted path params. Called by the dispatcher.
    pub fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// All extracted path params.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// The value of path param `key`, if the matched route bound one.
    #[must_use]
    pub fn path_value(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Record the matched route pattern. Called by the dispatcher.
    pub fn set_matched_route(&mut self, route: Option<String>) {
        self.matched_route = route;
    }

    /// The registered pattern of the matched route, when resolvable.
    #[must_use]
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    /// The staged status code, if a handler or middleware set one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Stage the response status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// The staged response body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Stage the response body, replacing any previous content.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Stage status and body in one call.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.set_status(status);
        self.set_body(body);
    }

    /// Deserialize the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let bytes = self.request.body().as_bytes();
        if bytes.is_empty() {
            return Err(BindError::EmptyBody);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The first query-string value for `key`, percent-decoded.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<String> {
        let raw = self.request.query()?;
        QueryString::parse(raw)
            .get_decoded(key)
            .map(std::borrow::Cow::into_owned)
    }

    /// The first urlencoded form value for `key`.
    ///
    /// The body is consulted first; when the key is absent there, the
    /// query string is the fallback.
    #[must_use]
    pub fn form_value(&self, key: &str) -> Option<String> {
        let body = self.request.body().as_bytes();
        if !body.is_empty() {
            if let Ok(text) = std::str::from_utf8(body) {
                let found = QueryString::parse(text)
                    .pairs()
                    .find(|&(k, _)| form_decode(k) == key)
                    .map(|(_, v)| form_decode(v).into_owned());
                if found.is_some() {
                    return found;
                }
            }
        }
        self.query_value(key)
    }

    /// Flush the staged status and body to the response sink.
    ///
    /// The first call writes; later calls are no-ops. A context that
    /// never staged a status flushes `200 OK`.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        self.sink.set_status(self.status.unwrap_or_default());
        self.sink.write_body(&self.body)
    }

    /// Whether the response has already been flushed.
    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("params", &self.params)
            .field("matched_route", &self.matched_route)
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Body, Method};
    use crate::testing::CaptureSink;
    use serde::Deserialize;

    fn request_with_body(body: &[u8]) -> Request {
        let mut req = Request::new(Method::Post, "/json");
        req.set_body(Body::Bytes(body.to_vec()));
        req
    }

    #[test]
    fn bind_json_decodes_body() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Data {
            code: i32,
            msg: String,
        }

        let req = request_with_body(br#"{"code": 7, "msg": "hi"}"#);
        let mut sink = CaptureSink::new();
        let ctx = Context::new(req, &mut sink);
        let data: Data = ctx.bind_json().unwrap();
        assert_eq!(
            data,
            Data {
                code: 7,
                msg: "hi".to_string()
            }
        );
    }

    #[test]
    fn bind_json_rejects_empty_body() {
        let req = Request::new(Method::Post, "/json");
        let mut sink = CaptureSink::new();
        let ctx = Context::new(req, &mut sink);
        let result: Result<serde_json::Value, _> = ctx.bind_json();
        assert!(matches!(result, Err(BindError::EmptyBody)));
    }

    #[test]
    fn bind_json_reports_malformed_body() {
        let req = request_with_body(b"{not json");
        let mut sink = CaptureSink::new();
        let ctx = Context::new(req, &mut sink);
        let result: Result<serde_json::Value, _> = ctx.bind_json();
        assert!(matches!(result, Err(BindError::Json(_))));
    }

    #[test]
    fn query_value_decodes() {
        let mut req = Request::new(Method::Get, "/search");
        req.set_query(Some("q=hello%20world&page=2".to_string()));
        let mut sink = CaptureSink::new();
        let ctx = Context::new(req, &mut sink);
        assert_eq!(ctx.query_value("q").as_deref(), Some("hello world"));
        assert_eq!(ctx.query_value("page").as_deref(), Some("2"));
        assert_eq!(ctx.query_value("missing"), None);
    }

    #[test]
    fn form_value_prefers_body_then_query() {
        let mut req = request_with_body(b"name=alice+b&city=oslo");
        req.set_query(Some("name=ignored&page=3".to_string()));
        let mut sink = CaptureSink::new();
        let ctx = Context::new(req, &mut sink);
        assert_eq!(ctx.form_value("name").as_deref(), Some("alice b"));
        assert_eq!(ctx.form_value("city").as_deref(), Some("oslo"));
        assert_eq!(ctx.form_value("page").as_deref(), Some("3"));
        assert_eq!(ctx.form_value("missing"), None);
    }

    #[test]
    fn path_value_reads_params() {
        let req = Request::new(Method::Get, "/user/42");
        let mut sink = CaptureSink::new();
        let mut ctx = Context::new(req, &mut sink);
        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        ctx.set_params(params);
        assert_eq!(ctx.path_value("id"), Some("42"));
        assert_eq!(ctx.path_value("name"), None);
    }

    #[test]
    fn flush_writes_once() {
        let req = Request::new(Method::Get, "/");
        let mut sink = CaptureSink::new();
        {
            let mut ctx = Context::new(req, &mut sink);
            ctx.respond(StatusCode::CREATED, "made");
            ctx.flush().unwrap();
            assert!(ctx.is_flushed());
            // Second flush must not emit a second response.
            ctx.flush().unwrap();
        }
        assert_eq!(sink.status(), Some(StatusCode::CREATED));
        assert_eq!(sink.body(), b"made");
        assert_eq!(sink.status_calls(), 1);
        assert_eq!(sink.body_calls(), 1);
    }

    #[test]
    fn flush_defaults_to_ok() {
        let req = Request::new(Method::Get, "/");
        let mut sink = CaptureSink::new();
        {
            let mut ctx = Context::new(req, &mut sink);
            ctx.flush().unwrap();
        }
        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert_eq!(sink.body(), b"");
    }
}
