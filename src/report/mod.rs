//! Per-sample network reports and the metrics CSV log.

pub mod csv_log;
#[cfg(feature = "http_report")]
pub mod http;

pub use csv_log::{read_metrics_log, ColumnStats, LogRow, LogSummary, MetricsLog, METRICS_LOG_HEADER};
#[cfg(feature = "http_report")]
pub use http::HttpReporter;

use serde::{Deserialize, Serialize};

use crate::metrics::Sample;

/// JSON payload sent for every observed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkReport {
    pub jitter: f64,
    pub packet_loss: f64,
    pub timestamp: u64,
    pub chunk_size: usize,
}

impl From<&Sample> for NetworkReport {
    fn from(sample: &Sample) -> Self {
        Self {
            jitter: sample.jitter_ms(),
            packet_loss: sample.loss_percent(),
            timestamp: sample.timestamp_ms(),
            chunk_size: sample.size_bytes(),
        }
    }
}

/// Fire-and-forget destination for network reports.
///
/// Implementations must not block the caller and must swallow their own
/// failures after logging them.
pub trait ReportSink {
    fn report(&self, report: &NetworkReport);
}

impl<T: ReportSink + ?Sized> ReportSink for Box<T> {
    fn report(&self, report: &NetworkReport) {
        (**self).report(report);
    }
}

/// Writes reports to the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ReportSink for LogReporter {
    fn report(&self, report: &NetworkReport) {
        match serde_json::to_string(report) {
            Ok(payload) => tracing::debug!(target: "report", %payload, "network report"),
            Err(err) => tracing::warn!(target: "report", "failed to encode report: {err}"),
        }
    }
}
