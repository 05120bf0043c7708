//! Server-Sent Events (SSE) for tagging progress streaming

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use pictor_common::events::TaggingEvent;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// GET /tagging/events - SSE event stream for tagging progress
///
/// Streams events:
/// - QueueItemStarted
/// - QueueItemCompleted
/// - QueueItemFailed
/// - BatchEnqueueCompleted
pub async fn tagging_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to tagging events");

    // Subscribe to event broadcast
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        info!("SSE: Tagging event stream started");

        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                // Broadcast events
                Ok(event) = rx.recv() => {
                    match &event {
                        TaggingEvent::QueueItemStarted { .. }
                        | TaggingEvent::QueueItemCompleted { .. }
                        | TaggingEvent::QueueItemFailed { .. }
                        | TaggingEvent::BatchEnqueueCompleted { .. } => {
                            let event_type = event.event_type();

                            match serde_json::to_string(&event) {
                                Ok(event_json) => {
                                    debug!("SSE: Broadcasting tagging event: {}", event_type);
                                    yield Ok(Event::default()
                                        .event(event_type)
                                        .data(event_json));
                                }
                                Err(e) => {
                                    warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
