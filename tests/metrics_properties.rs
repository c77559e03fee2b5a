use call_quality_meter::metrics::{Accumulator, QualityScorer, Sample, SeriesBuffer};
use proptest::prelude::*;

fn sample_values() -> impl Strategy<Value = Vec<(f64, f64)>> {
    proptest::collection::vec((0.0f64..500.0, 0.0f64..100.0), 1..64)
}

proptest! {
    #[test]
    fn flush_averages_observed_samples(values in sample_values()) {
        let mut accumulator = Accumulator::new(1_000, 0);
        for (i, (jitter, loss)) in values.iter().enumerate() {
            accumulator.observe(&Sample::new(*jitter, *loss, i as u64, 0));
        }

        let window = accumulator.maybe_flush(1_000).expect("window with samples flushes");
        let count = values.len() as f64;
        let jitter_avg = values.iter().map(|(j, _)| j).sum::<f64>() / count;
        let loss_avg = values.iter().map(|(_, l)| l).sum::<f64>() / count;

        prop_assert_eq!(window.sample_count as usize, values.len());
        prop_assert!((window.avg_jitter_ms - jitter_avg).abs() < 1e-9);
        prop_assert!((window.avg_loss_percent - loss_avg).abs() < 1e-9);
        prop_assert_eq!(accumulator.pending_count(), 0);
        prop_assert!(accumulator.maybe_flush(1_999).is_none());
    }

    #[test]
    fn score_is_bounded_and_non_increasing(
        jitter in 0.0f64..400.0,
        loss in 0.0f64..100.0,
        extra_jitter in 0.0f64..100.0,
        extra_loss in 0.0f64..50.0,
    ) {
        let base = QualityScorer::score(jitter, loss);
        prop_assert!((1.0..=5.0).contains(&base));
        prop_assert!(QualityScorer::score(jitter + extra_jitter, loss) <= base + 1e-12);
        prop_assert!(QualityScorer::score(jitter, (loss + extra_loss).min(100.0)) <= base + 1e-12);
    }

    #[test]
    fn series_keeps_most_recent_in_order(capacity in 1usize..40, appends in 0u64..120) {
        let mut series = SeriesBuffer::new(capacity);
        for value in 0..appends {
            series.append(value);
            prop_assert!(series.len() <= capacity);
        }

        let expected: Vec<u64> = (appends.saturating_sub(capacity as u64)..appends).collect();
        prop_assert_eq!(series.snapshot(), expected);
        prop_assert_eq!(series.labels(), (1..=series.len()).collect::<Vec<_>>());
    }
}

#[test]
fn extreme_conditions_score_minimum() {
    assert_eq!(QualityScorer::score(200.0, 100.0), 1.0);
}

#[test]
fn thirty_one_appends_keep_thirty() {
    let mut series = SeriesBuffer::default();
    for value in 1..=31u32 {
        series.append(value);
    }
    assert_eq!(series.len(), 30);
    assert_eq!(series.snapshot(), (2..=31).collect::<Vec<_>>());
}
