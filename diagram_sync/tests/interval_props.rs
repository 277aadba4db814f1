use chrono::{DateTime, Utc};
use diagram_sync::consolidate::linear_interpolate;
use diagram_sync::interval::{interval_bounds, round_to_interval};
use diagram_sync::level::ConsolidationLevel;
use proptest::prelude::*;

proptest! {
    #[test]
    fn every_instant_lies_in_its_rounded_bucket(secs in 0_i64..4_000_000_000, pick in 0_usize..4) {
        let level = ConsolidationLevel::RESAMPLED[pick];
        let interval = level.interval().unwrap();
        let t = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();

        let rounded = round_to_interval(interval, &t);
        let bounds = interval_bounds(interval, &rounded);
        prop_assert!(bounds.contains(&t), "{t} not in [{}, {}]", bounds.start, bounds.end);
        prop_assert_eq!(round_to_interval(interval, &rounded), rounded);
    }

    #[test]
    fn interpolation_stays_between_endpoints(
        t0 in -1_000_000_i64..1_000_000,
        half in 1_i64..10_000,
        y0 in -1000_i64..1000,
        y1 in -1000_i64..1000,
    ) {
        let t1 = t0 + 2 * half;
        let (y0, y1) = (y0 as f64, y1 as f64);
        prop_assert_eq!(linear_interpolate(t0, t0, y0, t1, y1), y0);
        prop_assert_eq!(linear_interpolate(t1, t0, y0, t1, y1), y1);
        let mid = linear_interpolate(t0 + half, t0, y0, t1, y1);
        prop_assert!((mid - (y0 + y1) / 2.0).abs() < 1e-9);
        prop_assert!(mid >= y0.min(y1) && mid <= y0.max(y1));
    }
}
