//! # authgate
//!
//! An authenticating reverse proxy for Kubernetes deployments.
//!
//! ## The contract
//!
//! ```text
//! GET /<route-key>/<rest>?<query>      Authorization: Bearer <caller jwt>
//!        │
//!        ├─ RequireBearer   signature (JWKS), issuer, audience  ─ fail → 401
//!        ├─ ProxyMapping    <route-key> → base url              ─ none → 502
//!        └─ Dispatcher      GET <base>/<rest>?<query>
//!                           Authorization: Bearer <service token>
//!                           relay status, content type, body
//! ```
//!
//! Routes come from `PROXY_<NAME>` environment variables: `PROXY_TEST_API`
//! serves `/test-api`. `/internal/is_alive`, `/internal/is_ready` and
//! `/internal/prometheus` answer without a token.
//!
//! ## Assembly
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use authgate::auth::{JwksClient, Validator};
//! use authgate::config::Config;
//! use authgate::env::SystemEnv;
//! use authgate::health::ApplicationState;
//! use authgate::metrics::Metrics;
//! use authgate::proxy::Dispatcher;
//! use authgate::token::StsClient;
//! use authgate::{Server, app};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env(&SystemEnv)?;
//! let http = app::http_client()?;
//!
//! let validator = Validator::new(
//!     JwksClient::new(config.jwks_url(), http.clone()),
//!     config.issuer(),
//!     config.client_id(),
//! );
//! let tokens = StsClient::new(http.clone(), config.sts_url(), config.service_user()?);
//! let dispatcher = Dispatcher::new(Arc::new(config.mapping().clone()), Arc::new(tokens), http);
//! let state = Arc::new(ApplicationState::new());
//!
//! let router = app::router(
//!     Arc::clone(&state),
//!     Arc::new(Metrics::new()?),
//!     Arc::new(validator),
//!     Arc::new(dispatcher),
//! );
//!
//! let server = Server::bind(config.bind_addr()).await?;
//! state.set_ready(true);
//! server.serve(router).await?;
//! # Ok(()) }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod auth;
pub mod config;
pub mod env;
pub mod health;
pub mod mapping;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod token;

pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
