//! Request router.
//!
//! Static routes live in one radix tree per HTTP method (O(path-length)
//! lookup via [`matchit`]). Anything a tree does not match goes to the
//! per-method fallback, which is where the proxy catch-all sits. Global
//! middleware wraps every request, matched or not.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{self, BoxFuture, BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    fallbacks: HashMap<Method, BoxedHandler>,
    layers: Arc<[BoxedMiddleware]>,
    not_found: BoxedHandler,
    method_not_allowed: BoxedHandler,
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallbacks: HashMap::new(),
            layers: Arc::from(Vec::new()),
            not_found: handler::not_found(),
            method_not_allowed: handler::method_not_allowed(),
        }
    }

    /// Register a `GET` handler for `path`.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and are read with [`Request::param`].
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with an existing one.
    /// Routes are registered at startup, so this surfaces before any traffic.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Handler for requests of `method` that no static route matched.
    pub fn fallback(mut self, method: Method, handler: impl Handler) -> Self {
        self.fallbacks.insert(method, handler.into_boxed_handler());
        self
    }

    /// Wrap every request in `middleware`. Layers run in registration order:
    /// the first one added sees the request first and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut layers = self.layers.to_vec();
        layers.push(Arc::new(middleware));
        self.layers = layers.into();
        self
    }

    /// Routes one request through the middleware chain to its endpoint.
    pub fn call(&self, mut req: Request) -> BoxFuture {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Lookup::Found(handler, params) => {
                req.params = params;
                handler
            }
            Lookup::MethodNotAllowed => Arc::clone(&self.method_not_allowed),
            Lookup::NotFound => Arc::clone(&self.not_found),
        };
        Next::new(Arc::clone(&self.layers), endpoint).run(req)
    }

    fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(tree) = self.routes.get(method)
            && let Ok(matched) = tree.at(path)
        {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(Arc::clone(matched.value), params);
        }

        if let Some(fallback) = self.fallbacks.get(method) {
            return Lookup::Found(Arc::clone(fallback), HashMap::new());
        }

        let served_elsewhere = !self.fallbacks.is_empty()
            || self.routes.values().any(|tree| tree.at(path).is_ok());
        if served_elsewhere { Lookup::MethodNotAllowed } else { Lookup::NotFound }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
