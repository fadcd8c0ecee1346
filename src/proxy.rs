//! Request dispatch to configured backends.
//!
//! `GET /<route-key><remainder>` goes to `<base-url><remainder>`, where the
//! base URL is looked up by route key in the [`ProxyMapping`] and the
//! remainder is everything after the first path segment, query included,
//! byte for byte. The caller's `Authorization` header is replaced by a
//! service token from the [`TokenProvider`].

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::handler::Handler;
use crate::mapping::ProxyMapping;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::token::{TokenError, TokenProvider};

/// Inbound headers never copied to the backend request.
pub const NOT_FORWARDED: [&str; 11] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "authorization",
];

/// Copy of `headers` without the [`NOT_FORWARDED`] ones. Repeated headers
/// keep every value.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !NOT_FORWARDED.contains(&name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Splits a request-target into route key and remainder.
///
/// ```
/// use authgate::proxy::split_route;
///
/// assert_eq!(split_route("/test-api/with/1?param=2"), ("test-api", "/with/1?param=2"));
/// assert_eq!(split_route("/test-api?x=1"), ("test-api", "?x=1"));
/// assert_eq!(split_route("/test-api"), ("test-api", ""));
/// ```
pub fn split_route(target: &str) -> (&str, &str) {
    let rest = target.strip_prefix('/').unwrap_or(target);
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    rest.split_at(end)
}

/// `base + remainder`, no normalization.
pub fn outbound_url(base: &str, remainder: &str) -> String {
    let mut url = String::with_capacity(base.len() + remainder.len());
    url.push_str(base);
    url.push_str(remainder);
    url
}

/// What came of one proxied request.
#[derive(Debug)]
pub enum ProxyOutcome {
    Forwarded {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        content_encoding: Option<HeaderValue>,
        body: Bytes,
    },
    UpstreamClientError(StatusCode),
    UpstreamServerError(StatusCode),
    UnknownRoute(String),
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        match self {
            ProxyOutcome::Forwarded { status, content_type, content_encoding, body } => {
                let mut builder = Response::builder().status(status);
                for (name, value) in [(CONTENT_TYPE, content_type), (CONTENT_ENCODING, content_encoding)] {
                    if let Some(value) = value {
                        builder = builder.header(name, value);
                    }
                }
                builder.body(body)
            }
            ProxyOutcome::UpstreamClientError(status) | ProxyOutcome::UpstreamServerError(status) => {
                Response::status(status)
            }
            ProxyOutcome::UnknownRoute(key) => Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .text(format!("Application {key} not configured")),
        }
    }
}

/// Failures that are neither the caller's nor the backend's answer.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("could not obtain outbound token: {0}")]
    Token(#[from] TokenError),

    #[error("request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading response from {url} failed: {source}")]
    ReadBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error!(error = %self, "proxy request failed");
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .text("internal server error")
    }
}

pub struct Dispatcher {
    mapping: Arc<ProxyMapping>,
    tokens: Arc<dyn TokenProvider>,
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new(mapping: Arc<ProxyMapping>, tokens: Arc<dyn TokenProvider>, http: reqwest::Client) -> Self {
        Self { mapping, tokens, http }
    }

    /// Forwards `req` to its backend. Makes at most one backend call and no
    /// call at all for an unknown route.
    pub async fn dispatch(&self, req: &Request) -> Result<ProxyOutcome, ProxyError> {
        let (key, remainder) = split_route(req.target());
        let Some(base) = self.mapping.get(key) else {
            warn!(route = key, "no backend configured for route");
            return Ok(ProxyOutcome::UnknownRoute(key.to_owned()));
        };

        let url = outbound_url(base, remainder);
        let credential = self.tokens.credential().await?;

        info!(url = %url, "forwarding request");
        let res = self
            .http
            .get(&url)
            .headers(forwardable_headers(req.headers()))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|source| ProxyError::Upstream { url: url.clone(), source })?;

        let status = res.status();
        info!(url = %url, status = status.as_u16(), "received response");

        if status.is_client_error() {
            warn!(url = %url, status = status.as_u16(), "backend rejected request");
            return Ok(ProxyOutcome::UpstreamClientError(status));
        }
        if status.is_server_error() {
            warn!(url = %url, status = status.as_u16(), "backend failed");
            return Ok(ProxyOutcome::UpstreamServerError(status));
        }

        let content_type = header(res.headers(), &CONTENT_TYPE);
        let content_encoding = header(res.headers(), &CONTENT_ENCODING);
        let body = res
            .bytes()
            .await
            .map_err(|source| ProxyError::ReadBody { url, source })?;

        Ok(ProxyOutcome::Forwarded { status, content_type, content_encoding, body })
    }
}

fn header(headers: &HeaderMap, name: &HeaderName) -> Option<HeaderValue> {
    headers.get(name).cloned()
}

/// Proxy endpoint for the router's catch-all.
pub fn handler(dispatcher: Arc<Dispatcher>) -> impl Handler {
    move |req: Request| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.dispatch(&req).await }
    }
}
