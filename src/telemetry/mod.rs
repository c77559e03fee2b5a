//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes session lifecycle, delivery and flush events
//! into a bounded history plus an async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::{broadcast, mpsc};

use crate::error::ErrorCode;
use crate::metrics::AveragedPoint;

pub mod events;

pub use events::{MetricEvent, SourceKind};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<Arc<TelemetryHub>> = Lazy::new(|| Arc::new(TelemetryHub::default()));

/// Access the global telemetry hub.
pub fn hub() -> Arc<TelemetryHub> {
    Arc::clone(&HUB)
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let history_capacity = history_capacity.max(1);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    /// Forward broadcast events into an unbounded channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<MetricEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history();
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<MetricEvent>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping the collector with typed recording helpers.
#[derive(Default)]
pub struct TelemetryHub {
    collector: TelemetryCollector,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_session_started(&self, source: SourceKind) {
        self.collector.publish(MetricEvent::SessionStarted {
            source,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_session_stopped(&self, points: u64, cancelled_deliveries: usize) {
        self.collector.publish(MetricEvent::SessionStopped {
            points,
            cancelled_deliveries,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_flush(&self, point: &AveragedPoint) {
        self.collector.publish(MetricEvent::WindowFlushed {
            sequence_index: point.sequence_index,
            avg_jitter_ms: point.avg_jitter_ms,
            avg_loss_percent: point.avg_loss_percent,
            quality_score: point.quality_score,
            sample_count: point.sample_count,
        });
    }

    pub fn record_delivered(&self, chunk_index: u64, delay_ms: u64) {
        self.collector.publish(MetricEvent::ChunkDelivered {
            chunk_index,
            delay_ms,
        });
    }

    pub fn record_dropped(&self, chunk_index: u64) {
        self.collector
            .publish(MetricEvent::ChunkDropped { chunk_index });
    }

    pub fn record_stats_missing(&self, report_count: usize) {
        self.collector
            .publish(MetricEvent::StatsMissing { report_count });
    }

    pub fn record_error<E: ErrorCode>(&self, err: &E, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CaptureError, CaptureErrorCodes};

    fn point(sequence_index: u64, quality_score: f64) -> AveragedPoint {
        AveragedPoint {
            avg_jitter_ms: 10.0,
            avg_loss_percent: 1.0,
            quality_score,
            sequence_index,
            sample_count: 10,
            timestamp_ms: 1_000 * (sequence_index + 1),
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::ChunkDelivered {
            chunk_index: 0,
            delay_ms: 12,
        });
        collector.publish(MetricEvent::ChunkDropped { chunk_index: 1 });
        collector.publish(MetricEvent::StatsMissing { report_count: 4 });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::ChunkDelivered { delay_ms: 12, .. }
        ));
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::StatsMissing { report_count: 4 }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for chunk_index in 0..3 {
            collector.publish(MetricEvent::ChunkDropped { chunk_index });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::ChunkDropped { chunk_index: 1 }
        ));
    }

    #[test]
    fn subscribers_receive_published_events() {
        let hub = TelemetryHub::new(8, 8);
        let mut rx = hub.collector().subscribe();
        hub.record_flush(&point(2, 4.1));

        match rx.try_recv() {
            Ok(MetricEvent::WindowFlushed {
                sequence_index,
                quality_score,
                ..
            }) => {
                assert_eq!(sequence_index, 2);
                assert!((quality_score - 4.1).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn errors_carry_their_code() {
        let hub = TelemetryHub::new(8, 8);
        hub.record_error(&CaptureError::PermissionDenied, "start");

        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot.recent,
            vec![MetricEvent::Error {
                code: CaptureErrorCodes::PERMISSION_DENIED,
                context: "start".to_string(),
            }]
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(MetricEvent::ChunkDropped { chunk_index: 9 }).unwrap();
        assert_eq!(json["type"], "chunk_dropped");
        assert_eq!(json["payload"]["chunk_index"], 9);
        assert_eq!(MetricEvent::ChunkDropped { chunk_index: 9 }.kind(), "chunk_dropped");
    }

    #[tokio::test]
    async fn unbounded_subscription_forwards_events() {
        let hub = TelemetryHub::new(8, 8);
        let mut rx = hub.collector().subscribe_unbounded();
        hub.record_session_started(SourceKind::Synthetic);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            MetricEvent::SessionStarted {
                source: SourceKind::Synthetic,
                ..
            }
        ));
    }
}
