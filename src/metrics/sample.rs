use serde::{Deserialize, Serialize};

/// One network-condition observation, produced per audio chunk or per
/// statistics poll.
///
/// Values are clamped on construction: jitter is never negative and loss
/// always lies in `[0, 100]`. Non-finite inputs become zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    jitter_ms: f64,
    loss_percent: f64,
    timestamp_ms: u64,
    size_bytes: usize,
}

impl Sample {
    pub fn new(jitter_ms: f64, loss_percent: f64, timestamp_ms: u64, size_bytes: usize) -> Self {
        Self {
            jitter_ms: finite_or_zero(jitter_ms).max(0.0),
            loss_percent: finite_or_zero(loss_percent).clamp(0.0, 100.0),
            timestamp_ms,
            size_bytes,
        }
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    pub fn loss_percent(&self) -> f64 {
        self.loss_percent
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
