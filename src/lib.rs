use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use thiserror::Error;

pub mod auth;
pub mod booking_client;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod harness;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;

use booking_client::NeobookingsClient;
use catalog::{CatalogError, Registry};
use config::{Config, ConfigError};
use dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, api_token: Option<String>) -> Self {
        Self {
            dispatcher,
            api_token: api_token.map(Arc::<str>::from),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("server i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads the catalog and wires it to a live booking client.
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher, StartupError> {
    let registry = Registry::load(config.catalog_path.as_deref())?;
    let client = NeobookingsClient::new(config)?;
    Ok(Dispatcher::new(Arc::new(registry), Arc::new(client)))
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
