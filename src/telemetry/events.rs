//! Telemetry event types describing session activity for the CLI and the
//! debug HTTP surface.

use serde::{Deserialize, Serialize};

pub use crate::source::SourceKind;

/// Session lifecycle, delivery and aggregation events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    SessionStarted {
        source: SourceKind,
        timestamp_ms: u64,
    },
    SessionStopped {
        points: u64,
        cancelled_deliveries: usize,
        timestamp_ms: u64,
    },
    WindowFlushed {
        sequence_index: u64,
        avg_jitter_ms: f64,
        avg_loss_percent: f64,
        quality_score: f64,
        sample_count: u32,
    },
    ChunkDelivered {
        chunk_index: u64,
        delay_ms: u64,
    },
    ChunkDropped {
        chunk_index: u64,
    },
    StatsMissing {
        report_count: usize,
    },
    Error {
        code: i32,
        context: String,
    },
}

impl MetricEvent {
    /// Short name matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricEvent::SessionStarted { .. } => "session_started",
            MetricEvent::SessionStopped { .. } => "session_stopped",
            MetricEvent::WindowFlushed { .. } => "window_flushed",
            MetricEvent::ChunkDelivered { .. } => "chunk_delivered",
            MetricEvent::ChunkDropped { .. } => "chunk_dropped",
            MetricEvent::StatsMissing { .. } => "stats_missing",
            MetricEvent::Error { .. } => "error",
        }
    }
}
