//! Bounded display series of averaged points.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Window length shown by charts: the last 30 flushes.
pub const DEFAULT_SERIES_CAPACITY: usize = 30;

/// One flushed window, scored and numbered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedPoint {
    pub avg_jitter_ms: f64,
    pub avg_loss_percent: f64,
    pub quality_score: f64,
    pub sequence_index: u64,
    pub sample_count: u32,
    pub timestamp_ms: u64,
}

impl AveragedPoint {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Jitter => self.avg_jitter_ms,
            Metric::PacketLoss => self.avg_loss_percent,
            Metric::Quality => self.quality_score,
        }
    }
}

/// Scalar streams a chart can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Jitter,
    PacketLoss,
    Quality,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Jitter, Metric::PacketLoss, Metric::Quality];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Jitter => "Jitter (ms)",
            Metric::PacketLoss => "Packet Loss (%)",
            Metric::Quality => "Quality (MOS)",
        }
    }
}

/// FIFO buffer trimmed from the front after every append.
///
/// `len() <= capacity()` holds after every call to [`SeriesBuffer::append`].
#[derive(Debug, Clone)]
pub struct SeriesBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> SeriesBuffer<T> {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn append(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Ordered copy, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// 1-based positions within the current window.
    pub fn labels(&self) -> Vec<usize> {
        (1..=self.items.len()).collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> Default for SeriesBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl SeriesBuffer<AveragedPoint> {
    /// Project one metric out of the buffered points.
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.items.iter().map(|point| point.value(metric)).collect()
    }
}
