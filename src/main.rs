use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::Level;

#[macro_use]
extern crate tracing;

mod checkout;
mod config;
mod crypto;
mod error;
mod healthz;
mod middleware;
mod model;
mod notification;
mod params;
mod signature;
mod sink;

/// Immutable shared state: the config loaded at startup and the record
/// sink. Handlers never read the environment themselves.
pub struct AppState {
    pub config: config::Config,
    pub sink: sink::RecordSink,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = config::Config::from_env()?;
    let sink = sink::RecordSink::from_config(&config);
    info!("Configured for {} ({:?})", config.gateway_url(), config);
    let state = Arc::new(AppState { config, sink });

    info!("Listening on port 8000");

    let routes = Router::new()
        .route("/", get(healthz::service_info))
        .route("/api/checkout", post(checkout::create_operation))
        .route("/api/notification", post(notification::notification))
        .layer(axum::middleware::from_fn(middleware::log_request))
        .with_state(state);

    let listener = TcpListener::bind("0.0.0.0:8000").await?;
    axum::serve(listener, routes.into_make_service()).await?;
    Ok(())
}
