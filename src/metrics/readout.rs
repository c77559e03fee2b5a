use serde::{Deserialize, Serialize};

use super::quality::QualityRating;
use super::series::AveragedPoint;

/// Formatted "current value" strings for a display collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readout {
    pub jitter: String,
    pub packet_loss: String,
    pub quality: String,
    pub rating: String,
    pub delivery: String,
}

impl Readout {
    pub fn from_point(point: &AveragedPoint, delivery_percent: Option<f64>) -> Self {
        Self {
            jitter: format!("{:.2} ms", point.avg_jitter_ms),
            packet_loss: format!("{:.2}%", point.avg_loss_percent),
            quality: format!("{:.2}", point.quality_score),
            rating: QualityRating::from_mos(point.quality_score).label().to_string(),
            delivery: delivery_percent
                .map(|percent| format!("{:.1}%", percent))
                .unwrap_or_else(|| "n/a".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        let point = AveragedPoint {
            avg_jitter_ms: 12.346,
            avg_loss_percent: 2.5,
            quality_score: 4.409_285,
            sequence_index: 0,
            sample_count: 10,
            timestamp_ms: 1_000,
        };

        let readout = Readout::from_point(&point, Some(97.26));
        assert_eq!(readout.jitter, "12.35 ms");
        assert_eq!(readout.packet_loss, "2.50%");
        assert_eq!(readout.quality, "4.41");
        assert_eq!(readout.rating, "Excellent");
        assert_eq!(readout.delivery, "97.3%");

        let readout = Readout::from_point(&point, None);
        assert_eq!(readout.delivery, "n/a");
    }
}
