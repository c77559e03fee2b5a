//! Async run loops pacing a session in real or virtual time.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::capture::{CaptureDevice, Recording};
use crate::error::{log_stats_error, CaptureError, StatsError};
use crate::metrics::AveragedPoint;
use crate::scheduler::{SystemClock, TimeSource, VirtualClock};
use crate::source::{LiveStatsSource, StatsProvider, SyntheticSource};

use super::{MetricsSession, SessionStats};

/// Scheduler resolution for delivery timers and capture polling.
pub const DEFAULT_STEP_MS: u64 = 10;

/// Advances time for a run loop.
pub enum Pacer {
    /// Waits on a tokio interval and reads the system clock.
    Realtime {
        clock: SystemClock,
        ticker: Interval,
    },
    /// Jumps a virtual clock forward without waiting.
    Virtual {
        clock: Arc<VirtualClock>,
        step_ms: u64,
    },
}

impl Pacer {
    /// Must be called from within a tokio runtime.
    pub fn realtime(step_ms: u64) -> Self {
        let mut ticker = interval(Duration::from_millis(step_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Pacer::Realtime {
            clock: SystemClock::new(),
            ticker,
        }
    }

    pub fn virtual_clock(step_ms: u64) -> Self {
        Self::with_clock(Arc::new(VirtualClock::new(0)), step_ms)
    }

    /// Virtual pacing over a clock the caller keeps a handle to.
    pub fn with_clock(clock: Arc<VirtualClock>, step_ms: u64) -> Self {
        Pacer::Virtual {
            clock,
            step_ms: step_ms.max(1),
        }
    }

    pub fn now_ms(&self) -> u64 {
        match self {
            Pacer::Realtime { clock, .. } => clock.now_ms(),
            Pacer::Virtual { clock, .. } => clock.now_ms(),
        }
    }

    /// Move to the next step and return the new time.
    pub async fn step(&mut self) -> u64 {
        match self {
            Pacer::Realtime { clock, ticker } => {
                ticker.tick().await;
                clock.now_ms()
            }
            Pacer::Virtual { clock, step_ms } => {
                let now = clock.advance(*step_ms);
                // Let spawned report tasks make progress between steps.
                tokio::task::yield_now().await;
                now
            }
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Pacer::Virtual { .. })
    }
}

/// Run limits shared by both loops.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this much time; `None` runs until shutdown (or, for
    /// replays, until the provider is exhausted).
    pub duration_ms: Option<u64>,
    /// Time between statistics polls in live runs.
    pub poll_interval_ms: u64,
    /// Graceful stop once the watched value turns `true`.
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl RunOptions {
    pub fn for_duration(duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            poll_interval_ms: 2_000,
            shutdown: None,
        }
    }

    fn should_stop(&self, started_ms: u64, now_ms: u64) -> bool {
        let expired = self
            .duration_ms
            .map(|duration| now_ms.saturating_sub(started_ms) >= duration)
            .unwrap_or(false);
        let requested = self
            .shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false);
        expired || requested
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub points: Vec<AveragedPoint>,
    pub stats: SessionStats,
    pub elapsed_ms: u64,
    pub recording: Option<Recording>,
}

/// Drive a synthetic session: capture chunks, simulate the link, flush.
///
/// # Errors
/// Only a capture failure at start is returned; the session is then still
/// idle.
pub async fn run_synthetic<R: Rng>(
    session: &mut MetricsSession<SyntheticSource<R>>,
    capture: &mut dyn CaptureDevice,
    pacer: &mut Pacer,
    options: RunOptions,
) -> Result<RunSummary, CaptureError> {
    let started_ms = pacer.now_ms();
    session.start(capture, started_ms)?;

    let mut points = Vec::new();
    let mut now_ms = started_ms;
    while !options.should_stop(started_ms, now_ms) {
        now_ms = pacer.step().await;

        for chunk in capture.take_chunks(now_ms) {
            points.extend(session.on_chunk(chunk, now_ms));
        }
        points.extend(session.tick(now_ms));
    }

    let recording = session.stop(capture);
    Ok(RunSummary {
        points,
        stats: session.stats(),
        elapsed_ms: now_ms.saturating_sub(started_ms),
        recording,
    })
}

/// Drive a live session: capture for the recording, poll statistics.
///
/// The first poll happens one poll interval after start. Provider failures
/// are logged and skipped; an exhausted replay ends the run.
///
/// # Errors
/// Only a capture failure at start is returned.
pub async fn run_live<P: StatsProvider + ?Sized>(
    session: &mut MetricsSession<LiveStatsSource>,
    capture: &mut dyn CaptureDevice,
    provider: &mut P,
    pacer: &mut Pacer,
    options: RunOptions,
) -> Result<RunSummary, CaptureError> {
    let started_ms = pacer.now_ms();
    session.start(capture, started_ms)?;

    let poll_interval_ms = options.poll_interval_ms.max(1);
    let mut next_poll_ms = started_ms + poll_interval_ms;
    let mut points = Vec::new();
    let mut now_ms = started_ms;

    while !options.should_stop(started_ms, now_ms) {
        now_ms = pacer.step().await;

        for chunk in capture.take_chunks(now_ms) {
            session.record_chunk(chunk);
        }

        if now_ms >= next_poll_ms {
            next_poll_ms += poll_interval_ms;
            match provider.get_stats().await {
                Ok(reports) => points.extend(session.on_stats(&reports, now_ms)),
                Err(StatsError::Exhausted) => {
                    tracing::info!("statistics replay exhausted, ending run");
                    break;
                }
                Err(err) => {
                    log_stats_error(&err, "run_live");
                    session.report_error(&err, "run_live");
                }
            }
        }

        points.extend(session.tick(now_ms));
    }

    let recording = session.stop(capture);
    Ok(RunSummary {
        points,
        stats: session.stats(),
        elapsed_ms: now_ms.saturating_sub(started_ms),
        recording,
    })
}
