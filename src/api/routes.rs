use std::convert::Infallible;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::ping::dispatch::MeasurementRequest;
use crate::ping::model::StreamEvent;

/// GET /api/stream?target=<url>[&duration=<n>]
///
/// Starts a test and streams its samples as Server-Sent Events, one JSON
/// object per `data:` line, ending with `{"status":"completed"}`.
pub async fn stream_results(
    State(state): State<AppState>,
    query: Result<Query<MeasurementRequest>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cmd = state.dispatcher.prepare(&request)?;

    // subscribe before broadcasting so no early sample is lost
    let session = state.aggregator.open(&cmd.session_id).await?;
    state.dispatcher.broadcast(&cmd).await?;
    info!("Streaming {} to requester", cmd.session_id);

    let events = session
        .into_stream(state.event_buffer)
        .filter_map(|event| to_sse_event(&event).map(Ok::<_, Infallible>));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

fn to_sse_event(event: &StreamEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!("Dropping unencodable stream event: {e}");
            None
        }
    }
}
