//! Middleware chain machinery.
//!
//! Middleware layers wrap the matched route handler in registration
//! order: the first registered layer is outermost, so its pre-call logic
//! runs first of all and its post-call logic runs last of all. Execution
//! walks an explicit slice-based continuation ([`Next`]) instead of
//! nesting closures, which keeps ownership of captured state flat and
//! makes the panic-containment boundary an ordinary return value.

mod access_log;
mod recovery;

pub use access_log::AccessLog;
pub use recovery::{Recovery, panic_message};

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::context::Context;

/// A route handler.
///
/// Handlers are opaque units of behavior: two handlers are equal only if
/// they are the same registered value (`Arc::ptr_eq`).
pub type Handler = Arc<dyn Fn(&mut Context<'_>) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler(f: impl Fn(&mut Context<'_>) + Send + Sync + 'static) -> Handler {
    Arc::new(f)
}

/// A middleware layer.
///
/// Implementations receive the context and the continuation of the chain;
/// calling [`Next::run`] invokes the remaining layers and finally the
/// route handler. Not calling it short-circuits the request.
pub trait Middleware: Send + Sync {
    /// Process the request, invoking `next` at the layer's chosen point.
    fn handle(&self, ctx: &mut Context<'_>, next: Next<'_>);
}

/// The remainder of a middleware chain, ending in the route handler.
///
/// `run` consumes the continuation, so a layer can invoke it at most
/// once.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    handler: &'a Handler,
}

impl<'a> Next<'a> {
    fn new(layers: &'a [Arc<dyn Middleware>], handler: &'a Handler) -> Self {
        Self { layers, handler }
    }

    /// Invoke the remaining layers and the route handler.
    pub fn run(self, ctx: &mut Context<'_>) {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.handle(
                ctx,
                Next {
                    layers: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(ctx),
        }
    }

    /// Invoke the remaining chain inside a failure boundary.
    ///
    /// A panic anywhere below this point is captured and returned as
    /// `Err` with its payload instead of unwinding further.
    pub fn run_contained(self, ctx: &mut Context<'_>) -> Result<(), Box<dyn Any + Send>> {
        catch_unwind(AssertUnwindSafe(|| self.run(ctx)))
    }
}

/// An ordered, immutable-after-registration middleware chain.
#[derive(Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. Earlier layers wrap later ones.
    pub fn push(&mut self, layer: impl Middleware + 'static) {
        self.layers.push(Arc::new(layer));
    }

    /// Append an already-shared layer.
    pub fn push_arc(&mut self, layer: Arc<dyn Middleware>) {
        self.layers.push(layer);
    }

    /// Number of registered layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the chain has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run the whole chain around `handler` for one request.
    pub fn execute(&self, ctx: &mut Context<'_>, handler: &Handler) {
        Next::new(&self.layers, handler).run(ctx);
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Adapter turning a closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context<'_>, Next<'_>) + Send + Sync,
{
    fn handle(&self, ctx: &mut Context<'_>, next: Next<'_>) {
        (self.0)(ctx, next);
    }
}

/// Build a middleware layer from a closure.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Context<'_>, Next<'_>) + Send + Sync,
{
    FnMiddleware(f)
}
