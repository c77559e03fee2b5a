use serde::{Deserialize, Serialize};

/// Running share of chunks that reached the receive side.
///
/// Every delivered chunk counts as 100, every dropped chunk as 0; the
/// reported value is the mean since the session started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTracker {
    delivered: u64,
    dropped: u64,
    delivered_bytes: u64,
    dropped_bytes: u64,
}

impl DeliveryTracker {
    pub fn record_delivered(&mut self, size_bytes: usize) {
        self.delivered += 1;
        self.delivered_bytes += size_bytes as u64;
    }

    pub fn record_dropped(&mut self, size_bytes: usize) {
        self.dropped += 1;
        self.dropped_bytes += size_bytes as u64;
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn delivered_bytes(&self) -> u64 {
        self.delivered_bytes
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// `None` until the first chunk is resolved either way.
    pub fn delivery_percent(&self) -> Option<f64> {
        let total = self.delivered + self.dropped;
        if total == 0 {
            None
        } else {
            Some(self.delivered as f64 * 100.0 / total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_no_percent() {
        assert_eq!(DeliveryTracker::default().delivery_percent(), None);
    }

    #[test]
    fn mixes_delivered_and_dropped() {
        let mut tracker = DeliveryTracker::default();
        tracker.record_delivered(160);
        tracker.record_delivered(160);
        tracker.record_delivered(160);
        tracker.record_dropped(160);

        assert_eq!(tracker.delivered(), 3);
        assert_eq!(tracker.dropped(), 1);
        assert_eq!(tracker.delivered_bytes(), 480);
        assert_eq!(tracker.delivery_percent(), Some(75.0));
    }
}
