//! Synthetic network conditions drawn per captured chunk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capture::AudioChunk;
use crate::config::SyntheticConfig;
use crate::metrics::Sample;

use super::{Delivery, SampleSource, SourceKind, SourcedSample};

/// Draws jitter and loss uniformly per chunk, then decides delivery.
///
/// Jitter is drawn from `[0, max_jitter_ms)` and loss from
/// `[0, max_loss_percent)`, independently. A third draw in `[0, 100)` above
/// the loss value delivers the chunk after `jitter` milliseconds.
pub struct SyntheticSource<R: Rng = StdRng> {
    rng: R,
    max_jitter_ms: f64,
    max_loss_percent: f64,
}

impl SyntheticSource<StdRng> {
    pub fn from_config(config: &SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(rng, config.max_jitter_ms, config.max_loss_percent)
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_config(&SyntheticConfig {
            seed: Some(seed),
            ..SyntheticConfig::default()
        })
    }
}

impl<R: Rng> SyntheticSource<R> {
    pub fn with_rng(rng: R, max_jitter_ms: f64, max_loss_percent: f64) -> Self {
        Self {
            rng,
            max_jitter_ms: max_jitter_ms.max(0.0),
            max_loss_percent: max_loss_percent.clamp(0.0, 100.0),
        }
    }
}

impl<R: Rng> SampleSource for SyntheticSource<R> {
    type Input = AudioChunk;

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn next_sample(&mut self, chunk: &AudioChunk, now_ms: u64) -> Option<SourcedSample> {
        let jitter_ms = self.rng.gen::<f64>() * self.max_jitter_ms;
        let loss_percent = self.rng.gen::<f64>() * self.max_loss_percent;

        let delivery = if self.rng.gen::<f64>() * 100.0 > loss_percent {
            Delivery::Delivered {
                chunk_index: chunk.index,
                delay_ms: jitter_ms.round() as u64,
            }
        } else {
            Delivery::Dropped {
                chunk_index: chunk.index,
            }
        };

        Some(SourcedSample {
            sample: Sample::new(jitter_ms, loss_percent, now_ms, chunk.size_bytes()),
            delivery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn chunk(index: u64) -> AudioChunk {
        AudioChunk {
            index,
            captured_at_ms: index * 100,
            data: vec![0; 160],
        }
    }

    #[test]
    fn draws_stay_within_configured_ranges() {
        let mut source = SyntheticSource::seeded(42);
        for index in 0..500 {
            let sourced = source.next_sample(&chunk(index), index * 100).unwrap();
            assert!((0.0..50.0).contains(&sourced.sample.jitter_ms()));
            assert!((0.0..5.0).contains(&sourced.sample.loss_percent()));
            assert_eq!(sourced.sample.size_bytes(), 160);
            assert_eq!(sourced.sample.timestamp_ms(), index * 100);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SyntheticSource::seeded(7);
        let mut b = SyntheticSource::seeded(7);
        for index in 0..20 {
            assert_eq!(
                a.next_sample(&chunk(index), 0),
                b.next_sample(&chunk(index), 0)
            );
        }
    }

    #[test]
    fn mostly_delivered_with_small_loss() {
        let mut source = SyntheticSource::seeded(1);
        let delivered = (0..1_000)
            .filter_map(|i| source.next_sample(&chunk(i), 0))
            .filter(|s| matches!(s.delivery, Delivery::Delivered { .. }))
            .count();
        // Expected drop rate is about 2.5%
        assert!(delivered > 940, "delivered {delivered}");
    }

    #[test]
    fn zero_delivery_draw_is_a_drop() {
        // StepRng(0, 0) always yields zero: jitter 0, loss 0, delivery draw 0.
        let mut source = SyntheticSource::with_rng(StepRng::new(0, 0), 50.0, 5.0);
        let sourced = source.next_sample(&chunk(3), 300).unwrap();
        assert_eq!(sourced.delivery, Delivery::Dropped { chunk_index: 3 });
        assert_eq!(sourced.sample.jitter_ms(), 0.0);
    }

    #[test]
    fn delivered_delay_matches_jitter() {
        let mut source = SyntheticSource::seeded(99);
        for index in 0..50 {
            let sourced = source.next_sample(&chunk(index), 0).unwrap();
            if let Delivery::Delivered { chunk_index, delay_ms } = sourced.delivery {
                assert_eq!(chunk_index, index);
                assert_eq!(delay_ms, sourced.sample.jitter_ms().round() as u64);
            }
        }
    }
}
