//! Route table of the proxy.

use std::sync::Arc;

use http::Method;

use crate::auth::Validator;
use crate::health::{self, ApplicationState};
use crate::metrics::{self, Metrics};
use crate::middleware::{self, CallId, RecordDuration, RequireBearer};
use crate::proxy::{self, Dispatcher};
use crate::router::Router;

/// Client for key-set, token and backend calls.
///
/// Redirects are followed (up to 10 hops), so the caller receives the final
/// response rather than a bare 3xx.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Internal endpoints answer without a token; every other `GET` must pass
/// [`RequireBearer`] before it reaches the [`Dispatcher`].
pub fn router(
    state: Arc<ApplicationState>,
    metrics: Arc<Metrics>,
    validator: Arc<Validator>,
    dispatcher: Arc<Dispatcher>,
) -> Router {
    Router::new()
        .get("/internal/is_alive", health::liveness(Arc::clone(&state)))
        .get("/internal/is_ready", health::readiness(state))
        .get("/internal/prometheus", metrics::exposition(Arc::clone(&metrics)))
        .fallback(
            Method::GET,
            middleware::wrap(RequireBearer::new(validator), proxy::handler(dispatcher)),
        )
        .layer(CallId)
        .layer(RecordDuration::new(metrics))
}
