//! HTTP/1.1 transport for the trellis web framework.
//!
//! This crate is the thin layer between TCP and the routing core:
//!
//! - A head parser that turns raw bytes into a
//!   [`Request`](trellis_core::Request), with configurable size limits
//! - A [`ResponseWriter`]/[`HttpSink`] pair that serializes the staged
//!   status and body back to the wire
//! - [`HttpServer`], the dispatcher: route resolution, middleware
//!   execution, and a thread-per-connection accept loop
//!
//! The routing core never sees sockets; everything it needs arrives as
//! a `Request` and leaves through a
//! [`ResponseSink`](trellis_core::ResponseSink).

#![forbid(unsafe_code)]

mod parser;
mod response;
mod server;

pub use parser::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_HEAD_SIZE, ParseError, ParseLimits, ParseStatus,
    parse_request,
};
pub use response::{HttpSink, ResponseWriter};
pub use server::{HttpServer, ServerConfig};
