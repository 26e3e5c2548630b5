//! Core types for the trellis web framework.
//!
//! This crate provides the fundamental building blocks:
//! - [`Request`], [`Method`], [`Headers`] and [`StatusCode`]
//! - [`Context`], the per-request state handed to handlers
//! - [`Handler`] values and the [`Middleware`] chain machinery
//! - The concrete [`Recovery`] and [`AccessLog`] middlewares
//! - Query/form decoding and structured [`logging`]
//!
//! # Design Principles
//!
//! - Registration happens once, single-threaded; everything the router
//!   and chain hold is read-only while serving
//! - A [`Context`] is owned by exactly one dispatch and never outlives
//!   its response
//! - Panic containment is an explicit result at the chain boundary, not
//!   an ambient mechanism

#![forbid(unsafe_code)]

mod context;
pub mod logging;
pub mod middleware;
pub mod query;
mod request;
mod response;
pub mod testing;

pub use context::{BindError, Context};
pub use logging::{LogEntry, LogLevel, Logger};
pub use middleware::{
    AccessLog, FnMiddleware, Handler, Middleware, MiddlewareChain, Next, Recovery, from_fn,
    handler, panic_message,
};
pub use query::{QueryString, form_decode, percent_decode};
pub use request::{Body, Headers, InvalidMethod, Method, Request};
pub use response::{ResponseSink, StatusCode};
