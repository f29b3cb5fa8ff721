//! Server-Sent Events (SSE) broadcaster
//!
//! Streams `BotEvent`s to connected clients, using the event name as the SSE
//! `event:` field and the JSON encoding as `data:`.

use super::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use tunebot_common::BotEvent;

/// Encode one event for the wire
fn to_sse(event: &BotEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.name()).data(json)),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.name(), e);
            None
        }
    }
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        "New SSE client connected ({} subscribers)",
        state.events.subscriber_count() + 1
    );

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => to_sse(&event).map(Ok),
            Err(e) => {
                // Lagged: the client missed events but the stream continues
                warn!("SSE client fell behind: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
