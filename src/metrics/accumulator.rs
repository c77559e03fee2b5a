//! Rolling-window accumulator turning raw samples into averaged points.

use serde::{Deserialize, Serialize};

use super::sample::Sample;

/// Averages produced by a single flush.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAverage {
    pub avg_jitter_ms: f64,
    pub avg_loss_percent: f64,
    pub sample_count: u32,
    pub window_start_ms: u64,
    pub window_end_ms: u64,
}

/// Sums jitter and loss since the last flush.
///
/// `maybe_flush` only divides when at least one sample was observed; an
/// elapsed window without samples restarts silently so the next window is
/// a full interval long.
#[derive(Debug, Clone)]
pub struct Accumulator {
    sum_jitter: f64,
    sum_loss: f64,
    count: u32,
    window_start_ms: u64,
    interval_ms: u64,
}

impl Accumulator {
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            sum_jitter: 0.0,
            sum_loss: 0.0,
            count: 0,
            window_start_ms: now_ms,
            interval_ms,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn pending_count(&self) -> u32 {
        self.count
    }

    pub fn window_start_ms(&self) -> u64 {
        self.window_start_ms
    }

    /// Drop pending sums and start a new window at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.sum_jitter = 0.0;
        self.sum_loss = 0.0;
        self.count = 0;
        self.window_start_ms = now_ms;
    }

    pub fn observe(&mut self, sample: &Sample) {
        self.sum_jitter += sample.jitter_ms();
        self.sum_loss += sample.loss_percent();
        self.count = self.count.saturating_add(1);
    }

    /// Emit the window average once `interval_ms` has elapsed.
    pub fn maybe_flush(&mut self, now_ms: u64) -> Option<WindowAverage> {
        if now_ms.saturating_sub(self.window_start_ms) < self.interval_ms {
            return None;
        }

        if self.count == 0 {
            self.window_start_ms = now_ms;
            return None;
        }

        let count = f64::from(self.count);
        let average = WindowAverage {
            avg_jitter_ms: self.sum_jitter / count,
            avg_loss_percent: self.sum_loss / count,
            sample_count: self.count,
            window_start_ms: self.window_start_ms,
            window_end_ms: now_ms,
        };
        self.reset(now_ms);
        Some(average)
    }
}
