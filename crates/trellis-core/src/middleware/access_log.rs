//! Access-log middleware.

use std::fmt;
use std::panic::resume_unwind;

use parking_lot::Mutex;
use serde::Serialize;

use crate::context::Context;
use crate::middleware::{Middleware, Next};

/// Fields in one access-log record.
#[derive(Debug, Serialize)]
struct AccessRecord<'a> {
    host: &'a str,
    method: &'a str,
    path: &'a str,
    route: &'a str,
}

type WriterFn = Box<dyn FnMut(&str) + Send>;

/// Emits one record per request to a configured sink function.
///
/// The record is produced after the inner chain returns, so it reflects
/// the matched route and a settled handler. The record is emitted even
/// when an inner layer panics; the panic is then resumed so an outer
/// [`Recovery`](crate::middleware::Recovery) layer still observes it.
pub struct AccessLog {
    writer: Mutex<WriterFn>,
}

impl AccessLog {
    /// Create an access log forwarding records to `writer`.
    ///
    /// Records are JSON objects with `host`, `method`, `path` and
    /// `route` fields; `route` is `--` when no route pattern resolved.
    pub fn new(writer: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn emit(&self, ctx: &Context<'_>) {
        let request = ctx.request();
        let record = AccessRecord {
            host: request.host(),
            method: request.method().as_str(),
            path: request.path(),
            route: ctx.matched_route().unwrap_or("--"),
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(_) => format!(
                "{} {} {} {}",
                record.host, record.method, record.path, record.route
            ),
        };
        let mut writer = self.writer.lock();
        (*writer)(&line);
    }
}

impl Middleware for AccessLog {
    fn handle(&self, ctx: &mut Context<'_>, next: Next<'_>) {
        let result = next.run_contained(ctx);
        self.emit(ctx);
        if let Err(payload) = result {
            resume_unwind(payload);
        }
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog").finish_non_exhaustive()
    }
}
