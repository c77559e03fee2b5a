use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::capture::StubCapture;
use crate::error::CaptureErrorCodes;
use crate::metrics::Sample;
use crate::report::read_metrics_log;
use crate::source::SyntheticSource;
use crate::telemetry::{MetricEvent, TelemetryHub};

fn telemetry() -> Arc<TelemetryHub> {
    Arc::new(TelemetryHub::new(64, 256))
}

fn synthetic_session(config: &AppConfig, hub: &Arc<TelemetryHub>) -> MetricsSession<SyntheticSource> {
    MetricsSession::new(SyntheticSource::seeded(11), config).with_telemetry(Arc::clone(hub))
}

fn reported(jitter_ms: f64, loss_percent: f64, now_ms: u64) -> SourcedSample {
    SourcedSample {
        sample: Sample::new(jitter_ms, loss_percent, now_ms, 0),
        delivery: Delivery::Reported,
    }
}

fn started() -> (MetricsSession<SyntheticSource>, StubCapture, Arc<TelemetryHub>) {
    let hub = telemetry();
    let mut session = synthetic_session(&AppConfig::default(), &hub);
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();
    (session, capture, hub)
}

#[test]
fn capture_failure_leaves_session_idle_and_retry_works() {
    let hub = telemetry();
    let mut session = synthetic_session(&AppConfig::default(), &hub);
    let mut capture = StubCapture::refusing(CaptureError::PermissionDenied);

    assert_eq!(
        session.start(&mut capture, 0),
        Err(CaptureError::PermissionDenied)
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.tick(5_000).is_none());
    assert_eq!(session.stats().samples, 0);
    assert!(hub.snapshot().recent.iter().any(|event| matches!(
        event,
        MetricEvent::Error { code, .. } if *code == CaptureErrorCodes::PERMISSION_DENIED
    )));

    capture.grant();
    session.start(&mut capture, 100).unwrap();
    assert!(session.is_running());
}

#[test]
fn second_start_is_rejected() {
    let (mut session, mut capture, _hub) = started();
    assert_eq!(
        session.start(&mut capture, 10),
        Err(CaptureError::AlreadyRunning)
    );
    assert!(session.is_running());
}

#[test]
fn dropped_sample_is_observed_but_never_received() {
    let (mut session, mut capture, hub) = started();
    let chunk = capture.take_chunks(100).remove(0);
    let size = chunk.size_bytes();
    session.record_chunk(chunk);

    let dropped = SourcedSample {
        sample: Sample::new(10.0, 2.0, 100, size),
        delivery: Delivery::Dropped { chunk_index: 0 },
    };
    assert!(session.ingest(dropped, 100).is_none());
    assert_eq!(session.pending_samples(), 1);
    assert_eq!(session.pending_deliveries(), 0);

    assert!(session.tick(900).is_none());
    assert!(session.recording().unwrap().received().is_empty());
    assert_eq!(session.delivery().dropped(), 1);
    assert_eq!(session.delivery().delivery_percent(), Some(0.0));

    let point = session.tick(1_000).unwrap();
    assert_eq!(point.sample_count, 1);
    assert_eq!(point.avg_jitter_ms, 10.0);
    assert!(hub
        .snapshot()
        .recent
        .contains(&MetricEvent::ChunkDropped { chunk_index: 0 }));
}

#[test]
fn delivered_chunk_arrives_after_its_delay() {
    let (mut session, mut capture, hub) = started();
    let chunk = capture.take_chunks(100).remove(0);
    session.record_chunk(chunk);

    let delivered = SourcedSample {
        sample: Sample::new(30.0, 0.0, 100, 1_600),
        delivery: Delivery::Delivered {
            chunk_index: 0,
            delay_ms: 30,
        },
    };
    session.ingest(delivered, 100);
    assert_eq!(session.next_delivery_due_ms(), Some(130));

    session.tick(129);
    assert!(session.recording().unwrap().received().is_empty());

    session.tick(130);
    assert_eq!(session.recording().unwrap().received().len(), 1);
    assert_eq!(session.delivery().delivery_percent(), Some(100.0));
    assert!(hub.snapshot().recent.contains(&MetricEvent::ChunkDelivered {
        chunk_index: 0,
        delay_ms: 30
    }));
}

#[test]
fn delivery_due_after_stop_is_discarded() {
    let (mut session, mut capture, _hub) = started();
    let chunk = capture.take_chunks(100).remove(0);
    session.record_chunk(chunk);
    session.ingest(
        SourcedSample {
            sample: Sample::new(40.0, 0.0, 100, 1_600),
            delivery: Delivery::Delivered {
                chunk_index: 0,
                delay_ms: 40,
            },
        },
        100,
    );

    let recording = session.stop(&mut capture).unwrap();
    assert_eq!(recording.original().len(), 1);
    assert!(recording.received().is_empty());
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.pending_deliveries(), 0);
    assert!(capture.is_inactive());

    assert!(session.tick(200).is_none());
    assert!(session.ingest(reported(1.0, 0.0, 300), 300).is_none());
    assert_eq!(session.stats().samples, 1);
    assert_eq!(session.delivery().delivered(), 0);
    assert!(session.stop(&mut capture).is_none());
}

#[test]
fn empty_window_restarts_without_flushing() {
    let (mut session, _capture, _hub) = started();

    assert!(session.tick(1_000).is_none());
    assert!(session.tick(2_500).is_none());
    assert!(session.series().is_empty());
    assert!(session.readout().is_none());

    assert!(session.ingest(reported(5.0, 1.0, 2_600), 2_600).is_none());
    assert!(session.tick(3_499).is_none());

    let point = session.tick(3_500).unwrap();
    assert_eq!(point.sequence_index, 0);
    assert_eq!(point.timestamp_ms, 3_500);
    assert!(point.avg_jitter_ms.is_finite());
}

#[test]
fn flush_averages_window_and_feeds_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("metrics.log");

    let hub = telemetry();
    let chart = SharedChart::new();
    let display = MemoryDisplay::new();
    let mut session = synthetic_session(&AppConfig::default(), &hub)
        .with_chart(chart.clone())
        .with_display(display.clone())
        .with_metrics_log(File::create(&log_path).unwrap())
        .unwrap();
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    session.ingest(reported(10.0, 1.0, 100), 100);
    session.ingest(reported(20.0, 3.0, 200), 200);
    let point = session.tick(1_000).unwrap();

    assert_eq!(point.avg_jitter_ms, 15.0);
    assert_eq!(point.avg_loss_percent, 2.0);
    assert_eq!(point.sample_count, 2);
    assert_eq!(point.quality_score, QualityScorer::score(15.0, 2.0));

    let snapshot = chart.snapshot();
    assert_eq!(snapshot.updates, 3);
    assert_eq!(snapshot.jitter.labels, vec![1]);
    assert_eq!(snapshot.jitter.values, vec![15.0]);
    assert_eq!(snapshot.packet_loss.values, vec![2.0]);
    assert_eq!(snapshot.quality.values, vec![point.quality_score]);

    let readout = display.latest().unwrap();
    assert_eq!(readout.jitter, "15.00 ms");
    assert_eq!(readout.packet_loss, "2.00%");
    assert_eq!(readout.delivery, "n/a");
    assert_eq!(session.readout(), Some(readout));

    session.stop(&mut capture);
    let rows = read_metrics_log(&log_path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time_s, 1.0);
    assert_eq!(rows[0].jitter_ms, 15.0);
}

#[test]
fn series_is_trimmed_to_capacity() {
    let mut config = AppConfig::default();
    config.aggregation.series_capacity = 3;
    let hub = telemetry();
    let mut session = synthetic_session(&config, &hub);
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    for window in 1..=5u64 {
        let now = window * 1_000;
        session.ingest(reported(window as f64, 0.0, now - 500), now - 500);
        assert!(session.tick(now).is_some());
    }

    let sequence: Vec<u64> = session
        .series()
        .snapshot()
        .iter()
        .map(|p| p.sequence_index)
        .collect();
    assert_eq!(sequence, vec![2, 3, 4]);
    assert_eq!(session.series().labels(), vec![1, 2, 3]);
    assert_eq!(session.stats().points, 5);
}

#[test]
fn synthetic_chunks_flush_once_per_interval() {
    let (mut session, mut capture, _hub) = started();

    let mut points = Vec::new();
    for now in (10..=3_000).step_by(10) {
        for chunk in capture.take_chunks(now) {
            points.extend(session.on_chunk(chunk, now));
        }
        points.extend(session.tick(now));
    }

    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p.sample_count == 10));
    assert!(points.iter().all(|p| (1.0..=5.0).contains(&p.quality_score)));
    assert_eq!(session.recording().unwrap().original().len(), 30);

    let stats = session.stats();
    assert_eq!(stats.samples, 30);
    assert_eq!(
        stats.delivered + stats.dropped + stats.pending_deliveries as u64,
        30
    );
}

#[test]
fn live_snapshots_without_inbound_rtp_are_skipped() {
    let hub = telemetry();
    let mut session = MetricsSession::new(LiveStatsSource::new(), &AppConfig::default())
        .with_telemetry(Arc::clone(&hub));
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    assert!(session.on_stats(&[], 1_000).is_none());
    assert!(hub
        .snapshot()
        .recent
        .contains(&MetricEvent::StatsMissing { report_count: 0 }));

    let point = session
        .on_stats(&[StatsReport::inbound_rtp(0.02, 1, 99)], 2_000)
        .unwrap();
    assert!((point.avg_jitter_ms - 20.0).abs() < 1e-9);
    assert!((point.avg_loss_percent - 1.0).abs() < 1e-9);
    assert_eq!(session.pending_deliveries(), 0);
}

#[test]
fn session_without_recording_keeps_no_audio() {
    let hub = telemetry();
    let mut session = synthetic_session(&AppConfig::default(), &hub).without_recording();
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    let mut points = 0;
    for now in (10..=60_000).step_by(10) {
        for chunk in capture.take_chunks(now) {
            points += session.on_chunk(chunk, now).into_iter().count();
        }
        points += session.tick(now).into_iter().count();
        assert!(session.recording().is_none());
    }

    assert_eq!(points, 60);
    assert_eq!(session.series().len(), 30);
    let stats = session.stats();
    assert_eq!(stats.samples, 600);
    assert!(stats.delivered > 0);
    assert_eq!(
        stats.delivered + stats.dropped + stats.pending_deliveries as u64,
        600
    );
    assert!(stats.pending_deliveries <= 2);
    assert!(session.stop(&mut capture).is_none());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn unrecorded_delivery_still_counts() {
    let hub = telemetry();
    let mut session = synthetic_session(&AppConfig::default(), &hub).without_recording();
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    session.ingest(
        SourcedSample {
            sample: Sample::new(20.0, 0.0, 100, 1_600),
            delivery: Delivery::Delivered {
                chunk_index: 0,
                delay_ms: 20,
            },
        },
        100,
    );
    session.tick(120);
    assert_eq!(session.delivery().delivered(), 1);
    assert_eq!(session.delivery().delivery_percent(), Some(100.0));
}

/// Accepts writes until `failing` is set, then errors and counts attempts.
#[derive(Clone, Default)]
struct FailingWriter {
    failing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FailingWriter {
    fn check(&self) -> io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        Ok(())
    }
}

impl io::Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()
    }
}

#[test]
fn metrics_log_failure_disables_log_but_not_flushing() {
    let writer = FailingWriter::default();
    let hub = telemetry();
    let chart = SharedChart::new();
    let display = MemoryDisplay::new();
    let mut session = synthetic_session(&AppConfig::default(), &hub)
        .with_chart(chart.clone())
        .with_display(display.clone())
        .with_metrics_log(writer.clone())
        .unwrap();
    let mut capture = StubCapture::default();
    session.start(&mut capture, 0).unwrap();

    writer.failing.store(true, Ordering::SeqCst);
    session.ingest(reported(10.0, 1.0, 100), 100);
    let first = session.tick(1_000).unwrap();
    assert_eq!(first.avg_jitter_ms, 10.0);
    assert_eq!(chart.snapshot().jitter.values, vec![10.0]);
    assert_eq!(display.latest().unwrap().jitter, "10.00 ms");
    let attempts = writer.attempts.load(Ordering::SeqCst);
    assert!(attempts > 0);

    session.ingest(reported(20.0, 2.0, 1_100), 1_100);
    let second = session.tick(2_000).unwrap();
    assert_eq!(second.sequence_index, 1);
    assert_eq!(chart.snapshot().jitter.values, vec![10.0, 20.0]);
    assert_eq!(display.latest().unwrap().jitter, "20.00 ms");

    session.stop(&mut capture);
    assert_eq!(writer.attempts.load(Ordering::SeqCst), attempts);
}
