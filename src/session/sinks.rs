//! Chart and readout collaborators fed on every flush.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::metrics::{Metric, Readout};

/// Receives the full labelled series of one metric after every flush.
pub trait ChartSink {
    fn update(&mut self, metric: Metric, labels: &[usize], series: &[f64]);
}

/// Receives the formatted current values after every flush.
pub trait DisplaySink {
    fn show(&mut self, readout: &Readout);
}

/// Labels and values last pushed for one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<usize>,
    pub values: Vec<f64>,
}

/// Last update of every metric plus an update counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    pub jitter: ChartSeries,
    pub packet_loss: ChartSeries,
    pub quality: ChartSeries,
    pub updates: u64,
}

impl ChartSnapshot {
    pub fn series(&self, metric: Metric) -> &ChartSeries {
        match metric {
            Metric::Jitter => &self.jitter,
            Metric::PacketLoss => &self.packet_loss,
            Metric::Quality => &self.quality,
        }
    }

    fn apply(&mut self, metric: Metric, labels: &[usize], series: &[f64]) {
        let slot = match metric {
            Metric::Jitter => &mut self.jitter,
            Metric::PacketLoss => &mut self.packet_loss,
            Metric::Quality => &mut self.quality,
        };
        slot.labels = labels.to_vec();
        slot.values = series.to_vec();
        self.updates += 1;
    }
}

/// Chart that keeps the last update per metric in memory.
#[derive(Debug, Default)]
pub struct MemoryChart {
    snapshot: ChartSnapshot,
}

impl MemoryChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &ChartSnapshot {
        &self.snapshot
    }
}

impl ChartSink for MemoryChart {
    fn update(&mut self, metric: Metric, labels: &[usize], series: &[f64]) {
        self.snapshot.apply(metric, labels, series);
    }
}

/// Cloneable chart handle readable from other threads.
#[derive(Debug, Clone, Default)]
pub struct SharedChart {
    inner: Arc<RwLock<ChartSnapshot>>,
}

impl SharedChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChartSink for SharedChart {
    fn update(&mut self, metric: Metric, labels: &[usize], series: &[f64]) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(metric, labels, series);
    }
}

/// Display that keeps every readout it was shown.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    shown: Arc<Mutex<Vec<Readout>>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Readout> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl DisplaySink for MemoryDisplay {
    fn show(&mut self, readout: &Readout) {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(readout.clone());
    }
}

/// Display that writes readouts to the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn show(&mut self, readout: &Readout) {
        tracing::info!(
            jitter = %readout.jitter,
            packet_loss = %readout.packet_loss,
            quality = %readout.quality,
            rating = %readout.rating,
            delivery = %readout.delivery,
            "readout"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_chart_keeps_last_update_per_metric() {
        let mut chart = MemoryChart::new();
        chart.update(Metric::Jitter, &[1], &[10.0]);
        chart.update(Metric::Jitter, &[1, 2], &[10.0, 12.0]);
        chart.update(Metric::Quality, &[1, 2], &[4.2, 4.1]);

        let snapshot = chart.snapshot();
        assert_eq!(snapshot.updates, 3);
        assert_eq!(snapshot.jitter.labels, vec![1, 2]);
        assert_eq!(snapshot.series(Metric::Quality).values, vec![4.2, 4.1]);
        assert!(snapshot.packet_loss.values.is_empty());
    }

    #[test]
    fn shared_chart_clones_observe_updates() {
        let chart = SharedChart::new();
        let mut writer = chart.clone();
        writer.update(Metric::PacketLoss, &[1], &[2.5]);
        assert_eq!(chart.snapshot().packet_loss.values, vec![2.5]);
    }

    #[test]
    fn memory_display_records_readouts() {
        let display = MemoryDisplay::new();
        let mut sink = display.clone();
        assert!(display.latest().is_none());

        let readout = Readout {
            jitter: "1.00 ms".into(),
            packet_loss: "0.00%".into(),
            quality: "4.41".into(),
            rating: "Excellent".into(),
            delivery: "n/a".into(),
        };
        sink.show(&readout);
        assert_eq!(display.count(), 1);
        assert_eq!(display.latest(), Some(readout));
    }
}
