//! Metrics session: capture lifecycle, deferred delivery and window flushing.
//!
//! A session is driven from a single task. Every entry point takes the
//! current time explicitly; nothing in here reads a clock.

pub mod driver;
pub mod sinks;

#[cfg(test)]
mod tests;

pub use driver::{run_live, run_synthetic, Pacer, RunOptions, RunSummary, DEFAULT_STEP_MS};
pub use sinks::{
    ChartSeries, ChartSink, ChartSnapshot, DisplaySink, LogDisplay, MemoryChart, MemoryDisplay,
    SharedChart,
};

use std::io::{self, Write};
use std::mem;
use std::sync::Arc;

use serde::Serialize;

use crate::capture::{AudioChunk, AudioFormat, CaptureDevice, Recording};
use crate::config::AppConfig;
use crate::error::{log_capture_error, CaptureError, ErrorCode};
use crate::metrics::{
    Accumulator, AveragedPoint, DeliveryTracker, Metric, QualityScorer, Readout, SeriesBuffer,
};
use crate::report::{MetricsLog, NetworkReport, ReportSink};
use crate::scheduler::DeliveryQueue;
use crate::source::{Delivery, LiveStatsSource, SampleSource, SourcedSample, StatsReport};
use crate::telemetry::{self, TelemetryHub};

/// Lifecycle of a [`MetricsSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Counters describing a session so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionStats {
    pub state: SessionState,
    pub samples: u64,
    pub points: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub pending_deliveries: usize,
    pub delivery_percent: Option<f64>,
}

/// Owns all per-session metrics state.
pub struct MetricsSession<S: SampleSource> {
    source: S,
    state: SessionState,
    chunk_period_ms: u64,
    accumulator: Accumulator,
    series: SeriesBuffer<AveragedPoint>,
    queue: DeliveryQueue,
    recording: Option<Recording>,
    delivery: DeliveryTracker,
    next_sequence: u64,
    samples_seen: u64,
    started_at_ms: u64,
    telemetry: Option<Arc<TelemetryHub>>,
    chart: Option<Box<dyn ChartSink>>,
    display: Option<Box<dyn DisplaySink>>,
    reporter: Option<Box<dyn ReportSink>>,
    metrics_log: Option<MetricsLog<Box<dyn Write>>>,
}

impl<S: SampleSource> MetricsSession<S> {
    /// Create an idle session publishing to the global telemetry hub.
    pub fn new(source: S, config: &AppConfig) -> Self {
        let format = AudioFormat::mono(config.capture.sample_rate);
        Self {
            source,
            state: SessionState::Idle,
            chunk_period_ms: config.capture.chunk_period_ms,
            accumulator: Accumulator::new(config.aggregation.flush_interval_ms, 0),
            series: SeriesBuffer::new(config.aggregation.series_capacity),
            queue: DeliveryQueue::new(),
            recording: Some(Recording::new(format)),
            delivery: DeliveryTracker::default(),
            next_sequence: 0,
            samples_seen: 0,
            started_at_ms: 0,
            telemetry: Some(telemetry::hub()),
            chart: None,
            display: None,
            reporter: None,
            metrics_log: None,
        }
    }

    pub fn with_telemetry(mut self, hub: Arc<TelemetryHub>) -> Self {
        self.telemetry = Some(hub);
        self
    }

    pub fn without_telemetry(mut self) -> Self {
        self.telemetry = None;
        self
    }

    pub fn with_chart(mut self, chart: impl ChartSink + 'static) -> Self {
        self.chart = Some(Box::new(chart));
        self
    }

    pub fn with_display(mut self, display: impl DisplaySink + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    /// Keep no audio: captured chunks are sampled and then discarded.
    ///
    /// Delivery counters still run; `stop` returns no recording.
    pub fn without_recording(mut self) -> Self {
        self.recording = None;
        self
    }

    pub fn with_reporter(mut self, reporter: impl ReportSink + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Write one CSV row per flushed point to `writer`.
    ///
    /// The header is written immediately.
    pub fn with_metrics_log(mut self, writer: impl Write + 'static) -> io::Result<Self> {
        let writer: Box<dyn Write> = Box::new(writer);
        self.metrics_log = Some(MetricsLog::new(writer)?);
        Ok(self)
    }

    /// Start capturing and begin the first aggregation window at `now_ms`.
    ///
    /// # Errors
    /// - `CaptureError::AlreadyRunning` when the session is running
    /// - Any error the capture device reports while opening its stream
    ///
    /// On error the session is left exactly as it was, so `start` may be
    /// retried with the same or another device.
    pub fn start(
        &mut self,
        capture: &mut dyn CaptureDevice,
        now_ms: u64,
    ) -> Result<(), CaptureError> {
        if self.state == SessionState::Running {
            let err = CaptureError::AlreadyRunning;
            log_capture_error(&err, "session_start");
            return Err(err);
        }

        if let Err(err) = capture.start(self.chunk_period_ms, now_ms) {
            log_capture_error(&err, "session_start");
            if let Some(hub) = &self.telemetry {
                hub.record_error(&err, "session_start");
            }
            return Err(err);
        }

        self.state = SessionState::Running;
        self.started_at_ms = now_ms;
        self.accumulator.reset(now_ms);
        self.queue.cancel_all();
        if let Some(recording) = self.recording.as_mut() {
            *recording = Recording::new(capture.format());
        }
        self.delivery = DeliveryTracker::default();

        tracing::info!(
            source = ?self.source.kind(),
            interval_ms = self.accumulator.interval_ms(),
            "metrics session started"
        );
        if let Some(hub) = &self.telemetry {
            hub.record_session_started(self.source.kind());
        }
        Ok(())
    }

    /// Stop capturing, cancel pending deliveries and hand back the recording.
    ///
    /// Returns `None` when the session was not running or keeps no recording.
    pub fn stop(&mut self, capture: &mut dyn CaptureDevice) -> Option<Recording> {
        if self.state != SessionState::Running {
            return None;
        }

        capture.stop();
        let cancelled = self.queue.cancel_all();
        self.state = SessionState::Stopped;

        if let Some(log) = self.metrics_log.as_mut() {
            if let Err(err) = log.flush() {
                tracing::warn!("failed to flush metrics log: {err}");
            }
        }

        tracing::info!(
            points = self.next_sequence,
            cancelled_deliveries = cancelled,
            "metrics session stopped"
        );
        if let Some(hub) = &self.telemetry {
            hub.record_session_stopped(self.next_sequence, cancelled);
        }

        self.recording
            .as_mut()
            .map(|recording| {
                let format = recording.format();
                mem::replace(recording, Recording::new(format))
            })
    }

    /// Keep a captured chunk in the original track without sampling it.
    pub fn record_chunk(&mut self, chunk: AudioChunk) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(recording) = self.recording.as_mut() {
            recording.push_original(chunk);
        }
    }

    /// Feed one sample into the pipeline.
    ///
    /// The sample is always observed by the accumulator. A simulated delivery
    /// is scheduled on the queue; a simulated drop only updates counters.
    /// Returns the point flushed as a consequence, if any. No-op unless
    /// running.
    pub fn ingest(&mut self, sourced: SourcedSample, now_ms: u64) -> Option<AveragedPoint> {
        if self.state != SessionState::Running {
            return None;
        }

        let sample = sourced.sample;
        self.accumulator.observe(&sample);
        self.samples_seen += 1;

        if let Some(reporter) = &self.reporter {
            reporter.report(&NetworkReport::from(&sample));
        }

        match sourced.delivery {
            Delivery::Delivered {
                chunk_index,
                delay_ms,
            } => self
                .queue
                .schedule(now_ms, delay_ms, chunk_index, sample.size_bytes()),
            Delivery::Dropped { chunk_index } => {
                self.delivery.record_dropped(sample.size_bytes());
                tracing::trace!(chunk_index, "chunk dropped");
                if let Some(hub) = &self.telemetry {
                    hub.record_dropped(chunk_index);
                }
            }
            Delivery::Reported => {}
        }

        self.flush_if_due(now_ms)
    }

    /// Fire due deliveries, then flush the window if its interval elapsed.
    ///
    /// No-op unless running.
    pub fn tick(&mut self, now_ms: u64) -> Option<AveragedPoint> {
        if self.state != SessionState::Running {
            return None;
        }

        for due in self.queue.pop_due(now_ms) {
            if let Some(recording) = self.recording.as_mut() {
                if recording.mark_received(due.chunk_index).is_none() {
                    tracing::debug!(chunk_index = due.chunk_index, "delivery for unrecorded chunk");
                }
            }
            self.delivery.record_delivered(due.size_bytes);
            if let Some(hub) = &self.telemetry {
                hub.record_delivered(due.chunk_index, due.delay_ms);
            }
        }

        self.flush_if_due(now_ms)
    }

    fn flush_if_due(&mut self, now_ms: u64) -> Option<AveragedPoint> {
        let window = self.accumulator.maybe_flush(now_ms)?;

        let point = AveragedPoint {
            avg_jitter_ms: window.avg_jitter_ms,
            avg_loss_percent: window.avg_loss_percent,
            quality_score: QualityScorer::score(window.avg_jitter_ms, window.avg_loss_percent),
            sequence_index: self.next_sequence,
            sample_count: window.sample_count,
            timestamp_ms: now_ms,
        };
        self.next_sequence += 1;
        self.series.append(point);

        if let Some(chart) = self.chart.as_mut() {
            let labels = self.series.labels();
            for metric in Metric::ALL {
                chart.update(metric, &labels, &self.series.series(metric));
            }
        }

        if let Some(display) = self.display.as_mut() {
            display.show(&Readout::from_point(&point, self.delivery.delivery_percent()));
        }

        let elapsed_ms = now_ms.saturating_sub(self.started_at_ms);
        let log_failure = self
            .metrics_log
            .as_mut()
            .and_then(|log| log.write_point(&point, elapsed_ms).err());
        if let Some(err) = log_failure {
            tracing::warn!("metrics log write failed, disabling log: {err}");
            self.metrics_log = None;
        }

        tracing::debug!(
            sequence_index = point.sequence_index,
            avg_jitter_ms = point.avg_jitter_ms,
            avg_loss_percent = point.avg_loss_percent,
            quality = point.quality_score,
            samples = point.sample_count,
            "window flushed"
        );
        if let Some(hub) = &self.telemetry {
            hub.record_flush(&point);
        }

        Some(point)
    }

    /// Publish an error that did not stop the session.
    pub fn report_error<E: ErrorCode>(&self, err: &E, context: &str) {
        if let Some(hub) = &self.telemetry {
            hub.record_error(err, context);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn series(&self) -> &SeriesBuffer<AveragedPoint> {
        &self.series
    }

    pub fn latest(&self) -> Option<&AveragedPoint> {
        self.series.latest()
    }

    /// Readout for the latest point, if any window has flushed.
    pub fn readout(&self) -> Option<Readout> {
        self.series
            .latest()
            .map(|point| Readout::from_point(point, self.delivery.delivery_percent()))
    }

    /// `None` after [`MetricsSession::without_recording`].
    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    pub fn delivery(&self) -> &DeliveryTracker {
        &self.delivery
    }

    pub fn pending_deliveries(&self) -> usize {
        self.queue.len()
    }

    pub fn next_delivery_due_ms(&self) -> Option<u64> {
        self.queue.next_due_ms()
    }

    pub fn pending_samples(&self) -> u32 {
        self.accumulator.pending_count()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state,
            samples: self.samples_seen,
            points: self.next_sequence,
            delivered: self.delivery.delivered(),
            dropped: self.delivery.dropped(),
            pending_deliveries: self.queue.len(),
            delivery_percent: self.delivery.delivery_percent(),
        }
    }
}

impl<S: SampleSource<Input = AudioChunk>> MetricsSession<S> {
    /// Record a captured chunk, draw its sample and ingest it.
    pub fn on_chunk(&mut self, chunk: AudioChunk, now_ms: u64) -> Option<AveragedPoint> {
        if self.state != SessionState::Running {
            return None;
        }

        let sourced = self.source.next_sample(&chunk, now_ms);
        if let Some(recording) = self.recording.as_mut() {
            recording.push_original(chunk);
        }
        match sourced {
            Some(sourced) => self.ingest(sourced, now_ms),
            None => self.flush_if_due(now_ms),
        }
    }
}

impl MetricsSession<LiveStatsSource> {
    /// Convert one statistics snapshot and ingest it.
    ///
    /// A snapshot without an inbound-rtp report is skipped.
    pub fn on_stats(&mut self, reports: &[StatsReport], now_ms: u64) -> Option<AveragedPoint> {
        if self.state != SessionState::Running {
            return None;
        }

        match self.source.next_sample(reports, now_ms) {
            Some(sourced) => self.ingest(sourced, now_ms),
            None => {
                tracing::debug!(reports = reports.len(), "no inbound-rtp report in snapshot");
                if let Some(hub) = &self.telemetry {
                    hub.record_stats_missing(reports.len());
                }
                self.flush_if_due(now_ms)
            }
        }
    }
}
