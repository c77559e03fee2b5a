//! Simplified E-model call quality estimate.
//!
//! The transmission rating factor R is derived from averaged jitter and
//! packet loss, then mapped onto the 1..=5 Mean Opinion Score scale.

use serde::{Deserialize, Serialize};

/// Default R factor for a clean narrowband call.
pub const R_BASE: f64 = 93.2;
/// R penalty per millisecond of jitter.
pub const JITTER_WEIGHT: f64 = 0.24;
/// R penalty per percent of packet loss.
pub const LOSS_WEIGHT: f64 = 2.5;

pub const MOS_MIN: f64 = 1.0;
pub const MOS_MAX: f64 = 5.0;

/// Pure MOS calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    /// Transmission rating factor, limited to the E-model domain `[0, 100]`.
    pub fn r_factor(avg_jitter_ms: f64, avg_loss_percent: f64) -> f64 {
        let jitter = non_negative(avg_jitter_ms);
        let loss = non_negative(avg_loss_percent);
        (R_BASE - JITTER_WEIGHT * jitter - LOSS_WEIGHT * loss).clamp(0.0, 100.0)
    }

    /// Mean Opinion Score in `[1, 5]`.
    ///
    /// R is limited to `[0, 100]` before the cubic is evaluated. Outside that
    /// domain the polynomial turns back up (R = -204.8 evaluates to ~116),
    /// which would clamp a dead link to 5.
    pub fn score(avg_jitter_ms: f64, avg_loss_percent: f64) -> f64 {
        let r = Self::r_factor(avg_jitter_ms, avg_loss_percent);
        let mos = 1.0 + 0.035 * r + 7e-6 * r * (r - 60.0) * (100.0 - r);
        mos.clamp(MOS_MIN, MOS_MAX)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else if value == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    }
}

/// Listening-quality band for a MOS value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

impl QualityRating {
    pub fn from_mos(mos: f64) -> Self {
        match mos {
            m if m >= 4.3 => QualityRating::Excellent,
            m if m >= 4.0 => QualityRating::Good,
            m if m >= 3.6 => QualityRating::Fair,
            m if m >= 3.1 => QualityRating::Poor,
            _ => QualityRating::Bad,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityRating::Excellent => "Excellent",
            QualityRating::Good => "Good",
            QualityRating::Fair => "Fair",
            QualityRating::Poor => "Poor",
            QualityRating::Bad => "Bad",
        }
    }
}
