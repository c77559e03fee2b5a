use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::telemetry::{MetricEvent, TelemetryHub};

pub type FlushStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of flushed windows.
///
/// Lagged receivers skip the missed events instead of closing the stream.
pub fn flushes(telemetry: &TelemetryHub) -> FlushStream {
    let receiver = telemetry.collector().subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event @ MetricEvent::WindowFlushed { .. }) => match serde_json::to_string(&event) {
                Ok(payload) => Some(Ok(Event::default().event("flush").data(payload))),
                Err(_) => None,
            },
            _ => None,
        }
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    )
}
