//! Handler trait and type erasure.
//!
//! The router holds handlers of *different* types in one table, so each one
//! is hidden behind a trait object (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn relay(req: Request) -> impl IntoResponse   ← what you write
//!        ↓ router.get("/path", relay)
//! relay.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(relay))                          ← stored as BoxedHandler
//!        ↓
//! handler.call(req)                                   ← one vtable dispatch
//!        ↓
//! Box::pin(async { relay(req).await.into_response() })
//! ```
//!
//! Closures work too, which is how handlers capture shared state such as the
//! proxy dispatcher or the readiness flags.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` lets the server run it on its own tokio task.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any function or closure with the shape:
///
/// ```text
/// Fn(Request) -> impl Future<Output = impl IntoResponse>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Endpoint used when nothing matched the path.
pub(crate) fn not_found() -> BoxedHandler {
    (|_req: Request| async { http::StatusCode::NOT_FOUND }).into_boxed_handler()
}

/// Endpoint used when the path exists but not for the request method.
pub(crate) fn method_not_allowed() -> BoxedHandler {
    (|_req: Request| async { http::StatusCode::METHOD_NOT_ALLOWED }).into_boxed_handler()
}
