// Call Quality Meter - network quality metrics for captured audio
// Windowed jitter/loss aggregation with MOS scoring over a bounded series

// Module declarations
pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod telemetry;

#[cfg(feature = "debug_http")]
pub mod http;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{CaptureError, ErrorCode, StatsError};
pub use metrics::{AveragedPoint, Metric, QualityRating, QualityScorer, Readout, Sample, SeriesBuffer};
pub use session::{MetricsSession, SessionState};
pub use source::{LiveStatsSource, SampleSource, SyntheticSource};
