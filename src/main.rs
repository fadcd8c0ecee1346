use std::sync::Arc;

use anyhow::Context;
use authgate::auth::{JwksClient, Validator};
use authgate::config::Config;
use authgate::env::SystemEnv;
use authgate::health::ApplicationState;
use authgate::metrics::Metrics;
use authgate::proxy::Dispatcher;
use authgate::token::StsClient;
use authgate::{Server, app};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env(&SystemEnv).context("loading configuration")?;
    let service_user = config.service_user().context("loading service user")?;
    info!(
        app = config.app_name(),
        jwks = config.jwks_url(),
        routes = ?config.mapping().keys().collect::<Vec<_>>(),
        "configuration loaded"
    );

    let http = app::http_client().context("building http client")?;

    let validator = Validator::new(
        JwksClient::new(config.jwks_url(), http.clone()),
        config.issuer(),
        config.client_id(),
    );
    let tokens = StsClient::new(http.clone(), config.sts_url(), service_user);
    let dispatcher = Dispatcher::new(Arc::new(config.mapping().clone()), Arc::new(tokens), http);
    let metrics = Metrics::new().context("registering metrics")?;
    let state = Arc::new(ApplicationState::new());

    let router = app::router(
        Arc::clone(&state),
        Arc::new(metrics),
        Arc::new(validator),
        Arc::new(dispatcher),
    );

    let server = Server::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;
    state.set_ready(true);

    let result = server.serve(router).await;

    state.set_ready(false);
    state.set_alive(false);
    result.context("serving")
}
