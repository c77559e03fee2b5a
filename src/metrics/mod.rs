//! Metrics core: samples, window accumulation, MOS scoring and the bounded
//! display series.
//!
//! Everything in here is pure data manipulation driven by explicit
//! timestamps, which keeps it deterministic under a virtual clock.

pub mod accumulator;
pub mod delivery;
pub mod quality;
pub mod readout;
pub mod sample;
pub mod series;

pub use accumulator::{Accumulator, WindowAverage};
pub use delivery::DeliveryTracker;
pub use quality::{QualityRating, QualityScorer};
pub use readout::Readout;
pub use sample::Sample;
pub use series::{AveragedPoint, Metric, SeriesBuffer, DEFAULT_SERIES_CAPACITY};
