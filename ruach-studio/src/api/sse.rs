//! Server-Sent Events stream of studio events

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::config::MODULE_NAME;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// Only forward events for this session
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// GET /events[?session_id=...]
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    ruach_common::sse::create_event_sse_stream(
        MODULE_NAME,
        state.event_bus.subscribe(),
        query.session_id,
    )
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
