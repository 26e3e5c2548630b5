//! Panic-recovery middleware.

use std::any::Any;
use std::fmt;

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use crate::response::StatusCode;

type ContentFn = Box<dyn Fn(&(dyn Any + Send)) -> Vec<u8> + Send + Sync>;

/// Contains panics from inner layers and the route handler.
///
/// When the inner chain terminates abnormally, the configured status and
/// content replace whatever the handler staged before failing. Install
/// this as the first (outermost) layer so it observes failures from every
/// inner one.
pub struct Recovery {
    status: StatusCode,
    content: ContentFn,
}

impl Recovery {
    /// Recover with a fixed status and body.
    #[must_use]
    pub fn new(status: StatusCode, content: impl Into<Vec<u8>>) -> Self {
        let bytes = content.into();
        Self {
            status,
            content: Box::new(move |_| bytes.clone()),
        }
    }

    /// Recover with a body computed from the captured panic payload.
    #[must_use]
    pub fn with_content(
        status: StatusCode,
        content: impl Fn(&(dyn Any + Send)) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        Self {
            status,
            content: Box::new(content),
        }
    }
}

impl Middleware for Recovery {
    fn handle(&self, ctx: &mut Context<'_>, next: Next<'_>) {
        if let Err(payload) = next.run_contained(ctx) {
            ctx.set_status(self.status);
            ctx.set_body((self.content)(payload.as_ref()));
        }
    }
}

impl fmt::Debug for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recovery")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Extract a readable message from a panic payload.
///
/// `panic!` with a literal yields `&str`; formatted panics yield
/// `String`. Anything else gets a placeholder.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MiddlewareChain, from_fn, handler};
    use crate::request::{Method, Request};
    use crate::testing::CaptureSink;

    #[test]
    fn recovers_from_handler_panic() {
        let mut chain = MiddlewareChain::new();
        chain.push(Recovery::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error!!!",
        ));
        let h = handler(|ctx: &mut Context<'_>| {
            ctx.respond(StatusCode::OK, "Hi!");
            panic!("oh shoot");
        });

        let mut sink = CaptureSink::new();
        let mut ctx = Context::new(Request::new(Method::Get, "/"), &mut sink);
        chain.execute(&mut ctx, &h);

        assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(ctx.body(), b"Internal Server Error!!!");
    }

    #[test]
    fn content_function_sees_the_payload() {
        let mut chain = MiddlewareChain::new();
        chain.push(Recovery::with_content(StatusCode::IM_A_TEAPOT, |payload| {
            format!("I am a teapot with err: {}", panic_message(payload)).into_bytes()
        }));
        let h = handler(|_ctx: &mut Context<'_>| panic!("oh shoot"));

        let mut sink = CaptureSink::new();
        let mut ctx = Context::new(Request::new(Method::Get, "/"), &mut sink);
        chain.execute(&mut ctx, &h);

        assert_eq!(ctx.status(), Some(StatusCode::IM_A_TEAPOT));
        assert_eq!(ctx.body(), b"I am a teapot with err: oh shoot");
    }

    #[test]
    fn recovers_from_inner_middleware_panic() {
        let mut chain = MiddlewareChain::new();
        chain.push(Recovery::new(StatusCode::INTERNAL_SERVER_ERROR, "contained"));
        chain.push(from_fn(|_ctx: &mut Context<'_>, _next: Next<'_>| {
            panic!("inner layer failed");
        }));
        let h = handler(|ctx: &mut Context<'_>| ctx.set_body("unreached"));

        let mut sink = CaptureSink::new();
        let mut ctx = Context::new(Request::new(Method::Get, "/"), &mut sink);
        chain.execute(&mut ctx, &h);

        assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(ctx.body(), b"contained");
    }

    #[test]
    fn normal_requests_pass_through_untouched() {
        let mut chain = MiddlewareChain::new();
        chain.push(Recovery::new(StatusCode::INTERNAL_SERVER_ERROR, "nope"));
        let h = handler(|ctx: &mut Context<'_>| ctx.respond(StatusCode::CREATED, "fine"));

        let mut sink = CaptureSink::new();
        let mut ctx = Context::new(Request::new(Method::Get, "/"), &mut sink);
        chain.execute(&mut ctx, &h);

        assert_eq!(ctx.status(), Some(StatusCode::CREATED));
        assert_eq!(ctx.body(), b"fine");
    }

    #[test]
    fn panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("literal");
        assert_eq!(panic_message(boxed.as_ref()), "literal");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("formatted"));
        assert_eq!(panic_message(boxed.as_ref()), "formatted");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
