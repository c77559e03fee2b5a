//! Live samples derived from transport statistics snapshots.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::metrics::Sample;

use super::{Delivery, SampleSource, SourceKind, SourcedSample};

/// Report type carrying inbound RTP counters.
pub const INBOUND_RTP: &str = "inbound-rtp";

/// One entry of a statistics snapshot.
///
/// Field names follow the JSON a stats endpoint produces; only the fields
/// the meter reads are modelled, everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Interarrival jitter in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    /// Cumulative lost packets; may be negative with duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_lost: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets_received: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
}

impl StatsReport {
    pub fn inbound_rtp(jitter_s: f64, packets_lost: i64, packets_received: u64) -> Self {
        Self {
            kind: INBOUND_RTP.to_string(),
            jitter: Some(jitter_s),
            packets_lost: Some(packets_lost),
            packets_received: Some(packets_received),
            ..Self::default()
        }
    }

    pub fn is_inbound_rtp(&self) -> bool {
        self.kind == INBOUND_RTP
    }
}

/// Anything that can hand out a statistics snapshot on demand.
pub trait StatsProvider: Send {
    fn get_stats(&mut self) -> BoxFuture<'_, Result<Vec<StatsReport>, StatsError>>;
}

/// Converts a snapshot into a sample using the first inbound-rtp report.
///
/// Loss is cumulative: `lost / (lost + received) * 100`, with negative
/// `packetsLost` read as zero and an empty total read as no loss.
#[derive(Debug, Default)]
pub struct LiveStatsSource {
    last_bytes_received: Option<u64>,
    snapshots_seen: u64,
}

impl LiveStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots_seen(&self) -> u64 {
        self.snapshots_seen
    }
}

impl SampleSource for LiveStatsSource {
    type Input = [StatsReport];

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    fn next_sample(&mut self, reports: &[StatsReport], now_ms: u64) -> Option<SourcedSample> {
        self.snapshots_seen += 1;
        let report = reports.iter().find(|r| r.is_inbound_rtp())?;

        let jitter_ms = report.jitter.unwrap_or(0.0) * 1000.0;
        let lost = report.packets_lost.unwrap_or(0).max(0) as f64;
        let received = report.packets_received.unwrap_or(0) as f64;
        let total = lost + received;
        let loss_percent = if total > 0.0 { lost / total * 100.0 } else { 0.0 };

        let size_bytes = match (report.bytes_received, self.last_bytes_received) {
            (Some(now), Some(before)) => now.saturating_sub(before) as usize,
            _ => 0,
        };
        if report.bytes_received.is_some() {
            self.last_bytes_received = report.bytes_received;
        }

        Some(SourcedSample {
            sample: Sample::new(jitter_ms, loss_percent, now_ms, size_bytes),
            delivery: Delivery::Reported,
        })
    }
}

/// Replays recorded snapshots from memory or a JSON file.
///
/// The file holds an array of snapshots, each an array of reports. Once the
/// snapshots run out every call yields [`StatsError::Exhausted`].
#[derive(Debug, Default)]
pub struct ReplayStatsProvider {
    snapshots: VecDeque<Vec<StatsReport>>,
}

impl ReplayStatsProvider {
    pub fn new(snapshots: Vec<Vec<StatsReport>>) -> Self {
        Self {
            snapshots: snapshots.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StatsError> {
        let snapshots: Vec<Vec<StatsReport>> = serde_json::from_str(json)?;
        Ok(Self::new(snapshots))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StatsError> {
        let contents = fs::read_to_string(&path)?;
        let provider = Self::from_json(&contents)?;
        log::info!(
            "[Replay] Loaded {} snapshots from {:?}",
            provider.remaining(),
            path.as_ref()
        );
        Ok(provider)
    }

    pub fn remaining(&self) -> usize {
        self.snapshots.len()
    }
}

impl StatsProvider for ReplayStatsProvider {
    fn get_stats(&mut self) -> BoxFuture<'_, Result<Vec<StatsReport>, StatsError>> {
        let next = self.snapshots.pop_front().ok_or(StatsError::Exhausted);
        Box::pin(future::ready(next))
    }
}
