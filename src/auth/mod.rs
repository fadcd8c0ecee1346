//! Bearer-token authentication.
//!
//! Every proxied request passes through [`Validator::validate`] first:
//!
//! 1. signature, checked against keys from the JSON Web Key Set endpoint
//!    (cached per `kid`, fetches throttled, see [`JwksClient`])
//! 2. `iss` must equal the configured issuer
//! 3. `aud` must contain the configured client id
//!
//! Any failure, including a missing token, is an [`AuthError`] and becomes a
//! `401` before a backend is ever contacted.

mod jwks;
mod throttle;
mod validator;

use std::sync::Arc;

use http::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::response::{IntoResponse, Response};

pub use jwks::{JwksClient, KeySetError};
pub use validator::Validator;

/// The identity behind a validated token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The `azp` claim: the client application that obtained the token.
    pub authorized_party: Option<String>,
    pub audience: Vec<String>,
    pub subject: Option<String>,
}

/// Why a request was not allowed through.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no bearer token")]
    MissingToken,

    #[error("malformed token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),

    #[error("token has no key id")]
    MissingKeyId,

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("signing key unavailable: {0}")]
    Key(#[source] Arc<KeySetError>),

    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("unexpected issuer")]
    Issuer,

    #[error("unexpected audience")]
    Audience,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))
            .no_body()
    }
}

/// The token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Any other scheme, or an empty
/// token, counts as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_absent() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn every_rejection_is_401_with_challenge() {
        let res = AuthError::MissingToken.into_response();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("www-authenticate"), Some("Bearer"));

        assert_eq!(AuthError::Audience.into_response().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Issuer.into_response().status_code(), StatusCode::UNAUTHORIZED);
    }
}
