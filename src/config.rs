//! Configuration management for capture, aggregation and simulation parameters
//!
//! This module provides runtime configuration loading from JSON files so the
//! flush interval, series window and synthetic network ranges can be tuned
//! without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/call_quality.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Audio capture parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Period between delivered chunks
    pub chunk_period_ms: u64,
    /// PCM sample rate for stub and microphone capture
    pub sample_rate: u32,
    /// Frequency of the stub capture tone
    pub tone_hz: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_period_ms: 100,
            sample_rate: 8_000,
            tone_hz: 440.0,
        }
    }
}

/// Window aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Minimum time between flushes of the accumulator
    pub flush_interval_ms: u64,
    /// Number of averaged points kept for display
    pub series_capacity: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1_000,
            series_capacity: 30,
        }
    }
}

/// Ranges for the synthetic network condition generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Upper bound of the uniform jitter draw
    pub max_jitter_ms: f64,
    /// Upper bound of the uniform packet loss draw
    pub max_loss_percent: f64,
    /// Fixed RNG seed; random when absent
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            max_jitter_ms: 50.0,
            max_loss_percent: 5.0,
            seed: None,
        }
    }
}

/// Live transport statistics polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    pub poll_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
        }
    }
}

/// Optional outputs for observed samples and flushed points
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Endpoint receiving per-sample JSON reports
    #[serde(default)]
    pub endpoint: Option<String>,
    /// CSV file receiving one row per flushed point
    #[serde(default)]
    pub metrics_log: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing files and invalid JSON both fall back to the defaults, with a
    /// warning in the log.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config.validated()
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Clamp values that would stall or break the pipeline.
    pub fn validated(mut self) -> Self {
        if self.capture.chunk_period_ms == 0 {
            log::warn!("[Config] chunk_period_ms must be > 0, using 100");
            self.capture.chunk_period_ms = 100;
        }
        if self.capture.sample_rate == 0 {
            log::warn!("[Config] sample_rate must be > 0, using 8000");
            self.capture.sample_rate = 8_000;
        }
        if self.aggregation.series_capacity == 0 {
            log::warn!("[Config] series_capacity must be >= 1, using 1");
            self.aggregation.series_capacity = 1;
        }
        if self.live.poll_interval_ms == 0 {
            log::warn!("[Config] poll_interval_ms must be > 0, using 2000");
            self.live.poll_interval_ms = 2_000;
        }
        self.synthetic.max_jitter_ms = non_negative(self.synthetic.max_jitter_ms);
        self.synthetic.max_loss_percent = non_negative(self.synthetic.max_loss_percent).min(100.0);
        self
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
