use std::sync::Arc;

use super::{Middleware, Next};
use crate::auth::{self, Validator};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// Rejects the request with `401` unless it carries a valid bearer token.
///
/// On success the [`Principal`](crate::auth::Principal) is stored in the
/// request extensions before the request continues down the chain.
pub struct RequireBearer {
    validator: Arc<Validator>,
}

impl RequireBearer {
    pub fn new(validator: Arc<Validator>) -> Self {
        Self { validator }
    }
}

impl Middleware for RequireBearer {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let validator = Arc::clone(&self.validator);
        Box::pin(async move {
            let verdict = validator.validate(auth::bearer_token(req.headers())).await;
            match verdict {
                Ok(principal) => {
                    req.extensions_mut().insert(principal);
                    next.run(req).await
                }
                Err(rejection) => rejection.into_response(),
            }
        })
    }
}
