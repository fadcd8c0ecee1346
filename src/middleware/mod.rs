//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. Built in:
//!
//! - [`CallId`]: correlation id per request, plus a tracing span around it
//! - [`RecordDuration`]: request-duration histogram keyed by normalized path
//! - [`RequireBearer`]: bearer-token gate in front of the proxy
//!
//! Global middleware is registered with [`Router::layer`](crate::Router::layer).
//! To guard a single handler, use [`wrap`].

mod auth;
mod call_id;
mod metrics;

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;

pub use auth::RequireBearer;
pub use call_id::{CallId, X_CORRELATION_ID};
pub use metrics::RecordDuration;

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// A request interceptor.
///
/// `call` receives the request and the rest of the chain. Call
/// [`Next::run`] to continue, or return a response directly to short-circuit.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of a middleware chain, ending in the endpoint handler.
pub struct Next {
    layers: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(layers: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { layers, position: 0, endpoint }
    }

    /// Hands the request to the next layer, or to the endpoint after the last one.
    pub fn run(mut self, req: Request) -> BoxFuture {
        match self.layers.get(self.position).cloned() {
            Some(layer) => {
                self.position += 1;
                layer.call(req, self)
            }
            None => self.endpoint.call(req),
        }
    }
}

/// Puts `middleware` in front of a single handler.
///
/// ```rust,ignore
/// router.fallback(Method::GET, middleware::wrap(RequireBearer::new(validator), relay))
/// ```
pub fn wrap(middleware: impl Middleware, handler: impl Handler) -> impl Handler {
    let layers: Arc<[BoxedMiddleware]> = Arc::from(vec![Arc::new(middleware) as BoxedMiddleware]);
    let endpoint = handler.into_boxed_handler();
    move |req: Request| Next::new(Arc::clone(&layers), Arc::clone(&endpoint)).run(req)
}
