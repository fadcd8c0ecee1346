//! Correlation id per request.

use http::HeaderValue;
use tracing::Instrument;
use uuid::Uuid;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Reuses the caller's `X-Correlation-ID` or generates a UUID, stores it on
/// the request (so backends receive it), echoes it on the response, and runs
/// the rest of the chain inside a `request` span carrying the id.
pub struct CallId;

impl Middleware for CallId {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let supplied = req
            .headers()
            .get(X_CORRELATION_ID)
            .filter(|v| !v.is_empty())
            .cloned();
        let id = match supplied {
            Some(value) => value,
            None => {
                let value = HeaderValue::from_str(&Uuid::new_v4().to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
                req.headers_mut().insert(X_CORRELATION_ID, value.clone());
                value
            }
        };

        let span = tracing::info_span!(
            "request",
            call_id = id.to_str().unwrap_or("-"),
            method = %req.method(),
            path = req.path(),
        );

        Box::pin(
            async move {
                let mut res = next.run(req).await;
                res.headers_mut().insert(X_CORRELATION_ID, id);
                res
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    fn router() -> Router {
        Router::new()
            .get("/", |req: Request| async move {
                req.header(X_CORRELATION_ID).unwrap_or("absent").to_owned()
            })
            .layer(CallId)
    }

    #[tokio::test]
    async fn keeps_the_callers_id() {
        let req = http::Request::get("/").header("X-Correlation-ID", "abc-1").body(()).unwrap();
        let res = router().call(Request::from(req)).await;
        assert_eq!(res.header(X_CORRELATION_ID), Some("abc-1"));
        assert_eq!(res.body().as_ref(), b"abc-1");
    }

    #[tokio::test]
    async fn generates_an_id_when_missing() {
        let res = router().call(Request::from(http::Request::get("/").body(()).unwrap())).await;
        let echoed = res.header(X_CORRELATION_ID).unwrap();
        assert!(Uuid::parse_str(echoed).is_ok());
        // The handler saw the same id the caller got back.
        assert_eq!(res.body().as_ref(), echoed.as_bytes());
    }
}
