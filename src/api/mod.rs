//! HTTP surface of the API process.
//!
//! A single streaming endpoint, `GET /api/stream`, glues the dispatcher and
//! the stream aggregator together; `GET /healthz` answers liveness probes.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bus::Bus;
use crate::config::PingSettings;
use crate::ping::aggregator::StreamAggregator;
use crate::ping::dispatch::Dispatcher;
use crate::utils::error::PingError;

pub use error::{ApiError, ErrorResponse};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub aggregator: Arc<StreamAggregator>,
    /// Events buffered between a session's relay and its HTTP response.
    pub event_buffer: usize,
}

impl AppState {
    pub fn new(bus: Arc<dyn Bus>, settings: &PingSettings) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(bus.clone(), settings)),
            aggregator: Arc::new(StreamAggregator::new(bus, settings)),
            event_buffer: settings.result_buffer,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stream", get(routes::stream_results))
        .route("/healthz", get(routes::healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `listener` until the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), PingError> {
    info!("HTTP API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests;
