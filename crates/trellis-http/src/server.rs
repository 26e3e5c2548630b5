//! The HTTP server: dispatcher plus TCP accept loop.

use std::io::{self, Read};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use trellis_core::{
    Context, Handler, Logger, Method, Middleware, MiddlewareChain, Request, ResponseSink,
    StatusCode, handler,
};
use trellis_router::{RouteError, Router};

use crate::parser::{ParseError, ParseLimits, ParseStatus, parse_request};
use crate::response::HttpSink;

/// Server configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    limits: ParseLimits,
}

impl ServerConfig {
    /// Create a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parser size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The parser size limits.
    #[must_use]
    pub fn limits(&self) -> ParseLimits {
        self.limits
    }
}

/// An HTTP server over the routing core.
///
/// Build during a single-threaded registration phase — middlewares
/// first, then routes — and then hand it to [`serve`](Self::serve).
/// Everything it holds is read-only while serving, so concurrent
/// dispatches share it without locking.
#[derive(Debug, Default)]
pub struct HttpServer {
    router: Router,
    chain: MiddlewareChain,
    config: ServerConfig,
    logger: Logger,
}

impl HttpServer {
    /// Create a server with no routes and no middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware layer. Earlier layers wrap later ones.
    #[must_use]
    pub fn middleware(mut self, layer: impl Middleware + 'static) -> Self {
        self.chain.push(layer);
        self
    }

    /// Replace the server configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the logger.
    #[must_use]
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Register `handler` for `method` at `path`.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), RouteError> {
        self.router.add_route(method, path, handler)
    }

    /// Register a GET handler.
    pub fn get(
        &mut self,
        path: &str,
        f: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Get, path, handler(f))
    }

    /// Register a POST handler.
    pub fn post(
        &mut self,
        path: &str,
        f: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Post, path, handler(f))
    }

    /// Register a PUT handler.
    pub fn put(
        &mut self,
        path: &str,
        f: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Put, path, handler(f))
    }

    /// Register a DELETE handler.
    pub fn delete(
        &mut self,
        path: &str,
        f: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Delete, path, handler(f))
    }

    /// Register a PATCH handler.
    pub fn patch(
        &mut self,
        path: &str,
        f: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        self.add_route(Method::Patch, path, handler(f))
    }

    /// The router, for inspection.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatch one request and flush its response to `sink`.
    ///
    /// This is the transport-facing entry point: resolve the route,
    /// build the context, run the middleware chain around the handler,
    /// flush exactly once. An unmatched request (or a matched node with
    /// no bound handler) gets the deterministic not-found response; the
    /// middleware chain does not run for it.
    pub fn handle(&self, request: Request, sink: &mut dyn ResponseSink) {
        let Some(found) = self.router.find_route(request.method(), request.path()) else {
            self.not_found(sink);
            return;
        };
        let Some(route_handler) = found.handler() else {
            self.not_found(sink);
            return;
        };
        let route_handler = Arc::clone(route_handler);
        let pattern = found.pattern().map(str::to_string);
        let params = found.into_params();

        let mut ctx = Context::new(request, sink);
        ctx.set_params(params);
        ctx.set_matched_route(pattern);
        self.chain.execute(&mut ctx, &route_handler);
        if let Err(err) = ctx.flush() {
            self.logger
                .error("server", &format!("response flush failed: {err}"));
        }
    }

    fn not_found(&self, sink: &mut dyn ResponseSink) {
        sink.set_status(StatusCode::NOT_FOUND);
        if let Err(err) = sink.write_body(b"404 page not found") {
            self.logger
                .error("server", &format!("not-found response failed: {err}"));
        }
    }

    /// Bind `addr` and serve forever.
    pub fn serve(self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve_on(listener)
    }

    /// Serve forever on an already-bound listener.
    ///
    /// Binding is split from serving so callers can act between the two
    /// (read back the local address, drop privileges, and so on). Each
    /// connection is handled on its own thread; a panic that escapes the
    /// middleware chain kills only that connection.
    pub fn serve_on(self, listener: TcpListener) -> io::Result<()> {
        let server = Arc::new(self);
        loop {
            match listener.accept() {
                Ok((stream, _peer)) => {
                    let server = Arc::clone(&server);
                    thread::spawn(move || server.handle_connection(stream));
                }
                Err(err) => {
                    server
                        .logger
                        .warn("server", &format!("accept failed: {err}"));
                }
            }
        }
    }

    fn handle_connection(&self, mut stream: TcpStream) {
        match self.read_request(&mut stream) {
            Ok(Some(request)) => {
                let mut sink = HttpSink::new(&mut stream);
                self.handle(request, &mut sink);
            }
            Ok(None) => {} // peer closed before sending a full request
            Err(err) => {
                let status = match err.get_ref().and_then(|e| e.downcast_ref::<ParseError>()) {
                    Some(ParseError::BodyTooLarge { .. } | ParseError::HeadTooLarge { .. }) => {
                        StatusCode::PAYLOAD_TOO_LARGE
                    }
                    Some(_) => StatusCode::BAD_REQUEST,
                    // A plain I/O failure: nothing to respond to.
                    None => return,
                };
                self.logger.warn("server", &format!("bad request: {err}"));
                let mut sink = HttpSink::new(&mut stream);
                sink.set_status(status);
                if let Err(err) = sink.write_body(status.canonical_reason().as_bytes()) {
                    self.logger
                        .warn("server", &format!("error response failed: {err}"));
                }
            }
        }
    }

    /// Read from the stream until one full request is buffered.
    ///
    /// `Ok(None)` means the peer closed the connection first.
    fn read_request(&self, stream: &mut TcpStream) -> io::Result<Option<Request>> {
        let limits = self.config.limits;
        let mut buf = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];
        loop {
            match parse_request(&buf, &limits) {
                Ok(ParseStatus::Complete(request, _consumed)) => return Ok(Some(request)),
                Ok(ParseStatus::Partial) => {}
                Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
            }
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Ok(None);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use trellis_core::testing::CaptureSink;
    use trellis_core::{AccessLog, Recovery};

    fn get_request(path: &str) -> Request {
        let mut request = Request::new(Method::Get, path);
        request.set_host("localhost");
        request
    }

    #[test]
    fn dispatches_to_the_matched_handler() {
        let mut server = HttpServer::new();
        server
            .get("/user/:id", |ctx: &mut Context<'_>| {
                let id = ctx.path_value("id").unwrap_or("?").to_string();
                ctx.respond(StatusCode::OK, format!("user {id}"));
            })
            .unwrap();

        let mut sink = CaptureSink::new();
        server.handle(get_request("/user/42"), &mut sink);
        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert_eq!(sink.body_text(), "user 42");
        assert_eq!(sink.status_calls(), 1);
        assert_eq!(sink.body_calls(), 1);
    }

    #[test]
    fn unmatched_request_gets_deterministic_not_found() {
        let mut server = HttpServer::new();
        server
            .get("/known", |ctx: &mut Context<'_>| {
                ctx.set_status(StatusCode::OK);
            })
            .unwrap();

        let mut sink = CaptureSink::new();
        server.handle(get_request("/unknown"), &mut sink);
        assert_eq!(sink.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(sink.body_text(), "404 page not found");
    }

    #[test]
    fn handlerless_interior_node_is_not_found() {
        let mut server = HttpServer::new();
        server
            .get("/a/b", |ctx: &mut Context<'_>| {
                ctx.set_status(StatusCode::OK);
            })
            .unwrap();

        let mut sink = CaptureSink::new();
        server.handle(get_request("/a"), &mut sink);
        assert_eq!(sink.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn middleware_does_not_run_for_not_found() {
        let hits = Arc::new(Mutex::new(0_u32));
        let hits_in_layer = Arc::clone(&hits);
        let mut server =
            HttpServer::new().middleware(trellis_core::from_fn(
                move |ctx: &mut Context<'_>, next: trellis_core::Next<'_>| {
                    *hits_in_layer.lock() += 1;
                    next.run(ctx);
                },
            ));
        server
            .get("/here", |ctx: &mut Context<'_>| {
                ctx.set_status(StatusCode::OK);
            })
            .unwrap();

        let mut sink = CaptureSink::new();
        server.handle(get_request("/nowhere"), &mut sink);
        assert_eq!(*hits.lock(), 0);

        let mut sink = CaptureSink::new();
        server.handle(get_request("/here"), &mut sink);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn recovery_and_access_log_wrap_dispatch() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);
        let mut server = HttpServer::new()
            .middleware(Recovery::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error!!!",
            ))
            .middleware(AccessLog::new(move |line: &str| {
                sink_lines.lock().push(line.to_string());
            }));
        server
            .get("/boom", |_ctx: &mut Context<'_>| panic!("oh shoot"))
            .unwrap();

        let mut sink = CaptureSink::new();
        server.handle(get_request("/boom"), &mut sink);

        assert_eq!(sink.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(sink.body_text(), "Internal Server Error!!!");

        let lines = lines.lock();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["route"], "/boom");
        assert_eq!(record["method"], "GET");
    }

    #[test]
    fn route_registration_errors_surface() {
        let mut server = HttpServer::new();
        server.get("/dup", |_ctx: &mut Context<'_>| {}).unwrap();
        assert!(matches!(
            server.get("/dup", |_ctx: &mut Context<'_>| {}),
            Err(RouteError::DuplicateRoute { .. })
        ));
    }
}
