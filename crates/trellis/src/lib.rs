//! A small web framework built around a per-method routing trie and
//! LIFO-ordered middleware.
//!
//! # Quick Start
//!
//! ```no_run
//! use trellis::prelude::*;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut server = HttpServer::new()
//!         .middleware(Recovery::new(
//!             StatusCode::INTERNAL_SERVER_ERROR,
//!             "something went wrong",
//!         ));
//!
//!     server
//!         .get("/user/:id", |ctx: &mut Context<'_>| {
//!             let id = ctx.path_value("id").unwrap_or("?").to_string();
//!             ctx.respond(StatusCode::OK, format!("user {id}"));
//!         })
//!         .expect("route registration");
//!
//!     server.serve("127.0.0.1:8001")
//! }
//! ```
//!
//! # Crate Structure
//!
//! - [`trellis_core`] — Context, request/response types, middleware
//!   machinery
//! - [`trellis_router`] — the per-method trie
//! - [`trellis_http`] — HTTP/1.1 parsing, serialization, and the server

#![forbid(unsafe_code)]

// Re-export crates
pub use trellis_core as core;
pub use trellis_http as http;
pub use trellis_router as router;

// Re-export commonly used types
pub use trellis_core::{
    AccessLog, BindError, Body, Context, Handler, Headers, LogLevel, Logger, Method, Middleware,
    MiddlewareChain, Next, Recovery, Request, ResponseSink, StatusCode, from_fn, handler,
    panic_message,
};
pub use trellis_http::{HttpServer, ParseLimits, ServerConfig};
pub use trellis_router::{RouteError, RouteMatch, Router};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        AccessLog, Context, Handler, HttpServer, Method, Middleware, Next, Recovery, Request,
        RouteError, Router, StatusCode, from_fn, handler,
    };
    pub use serde::{Deserialize, Serialize};
}

/// Testing utilities module.
pub mod testing {
    pub use trellis_core::testing::CaptureSink;
}
