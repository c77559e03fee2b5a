//! Sample sources: synthetic per-chunk draws and live transport statistics.

pub mod live;
pub mod synthetic;

pub use live::{LiveStatsSource, ReplayStatsProvider, StatsProvider, StatsReport, INBOUND_RTP};
pub use synthetic::SyntheticSource;

use serde::{Deserialize, Serialize};

use crate::metrics::Sample;

/// Where a session's samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    Live,
}

/// What happened to the chunk a sample describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Delivery {
    /// Simulated delivery after `delay_ms`.
    Delivered { chunk_index: u64, delay_ms: u64 },
    /// Simulated loss; nothing reaches the receive side.
    Dropped { chunk_index: u64 },
    /// Measured by the transport; nothing to simulate.
    Reported,
}

/// A sample plus its delivery outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcedSample {
    pub sample: Sample,
    pub delivery: Delivery,
}

/// Anything able to turn its input into a network-condition sample.
///
/// `None` means "nothing this tick" and is not an error.
pub trait SampleSource {
    type Input: ?Sized;

    fn kind(&self) -> SourceKind;

    fn next_sample(&mut self, input: &Self::Input, now_ms: u64) -> Option<SourcedSample>;
}
