//! Server-Sent Events (SSE) utilities
//!
//! Bridges the EventBus to an axum SSE response.

use crate::events::{EventBus, HotspotEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Heartbeat interval for idle SSE connections
const HEARTBEAT: Duration = Duration::from_secs(15);

/// Stream events from `bus` that satisfy `filter` as SSE messages
///
/// Each event is sent with its `event_type()` as the SSE event name and its
/// JSON form as data. Lagged receivers skip the dropped events and continue.
pub fn event_bus_sse_stream<F>(
    bus: &EventBus,
    service_name: &'static str,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&HotspotEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter(&event) {
                        continue;
                    }
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: Broadcasting {} event", event_type);
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => warn!("SSE: Failed to serialize event {}: {}", event_type, e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: {} client lagged, events dropped", service_name);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat"))
}
