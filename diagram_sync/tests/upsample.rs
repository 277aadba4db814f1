mod common;

use common::{at, diagram_record, level_records, memory_store, temperature, weather_mapping};
use diagram_sync::consolidate::{ConsolidationError, ResampleReport, upsample};
use diagram_sync::level::ConsolidationLevel::{Minute, Raw};
use diagram_sync::mapping::Mapping;
use diagram_sync::store::memory::MemoryStore;

fn raw(store: &mut MemoryStore, points: &[(chrono::DateTime<chrono::Utc>, f64)]) {
    store.insert_all(common::DIAGRAM, points.iter().map(|&(t, v)| diagram_record(Raw, t, v)));
}

fn minute_values(store: &MemoryStore) -> Vec<(chrono::DateTime<chrono::Utc>, f64)> {
    level_records(store, Minute)
        .iter()
        .map(|r| (r.measurement_time().unwrap(), temperature(r)))
        .collect()
}

#[test]
fn interpolates_the_minutes_between_two_samples() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 0), 0.0), (at(10, 10, 0), 10.0)]);

    let report = upsample(&mut store, &mut mapping, 0).unwrap();
    assert_eq!(report, ResampleReport { read: 2, generated: 9 });

    let expected: Vec<_> = (1..=9).map(|m| (at(10, m, 0), f64::from(m))).collect();
    assert_eq!(minute_values(&store), expected);
    assert_eq!(mapping.cursor(Minute).unwrap().last_measurement_time, Some(at(10, 9, 0)));
    assert_eq!(store.cursor(1, Minute).unwrap().last_measurement_time, Some(at(10, 9, 0)));
}

#[test]
fn rerun_without_new_samples_is_a_no_op() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 0), 0.0), (at(10, 10, 0), 10.0)]);

    upsample(&mut store, &mut mapping, 0).unwrap();
    let before = level_records(&store, Minute);
    let report = upsample(&mut store, &mut mapping, 0).unwrap();

    assert_eq!(report, ResampleReport { read: 2, generated: 0 });
    assert_eq!(level_records(&store, Minute), before);
    assert_eq!(mapping.cursor(Minute).unwrap().last_measurement_time, Some(at(10, 9, 0)));
}

#[test]
fn continues_without_gap_when_samples_arrive() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 0), 0.0), (at(10, 10, 0), 10.0)]);
    upsample(&mut store, &mut mapping, 0).unwrap();

    raw(&mut store, &[(at(10, 20, 0), 30.0)]);
    let report = upsample(&mut store, &mut mapping, 0).unwrap();

    // anchor at 10:00 plus the samples at 10:10 and 10:20
    assert_eq!(report, ResampleReport { read: 3, generated: 10 });
    let values = minute_values(&store);
    assert_eq!(values.len(), 19);
    assert_eq!(values[9], (at(10, 10, 0), 10.0));
    assert_eq!(values[14], (at(10, 15, 0), 20.0));
    assert_eq!(values[18], (at(10, 19, 0), 28.0));
    assert_eq!(mapping.cursor(Minute).unwrap().last_measurement_time, Some(at(10, 19, 0)));
}

#[test]
fn limit_caps_generated_points_and_resumes() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 0), 0.0), (at(10, 10, 0), 10.0)]);

    let first = upsample(&mut store, &mut mapping, 3).unwrap();
    assert_eq!(first, ResampleReport { read: 2, generated: 3 });
    assert_eq!(mapping.cursor(Minute).unwrap().last_measurement_time, Some(at(10, 3, 0)));

    let second = upsample(&mut store, &mut mapping, 3).unwrap();
    assert_eq!(second, ResampleReport { read: 2, generated: 3 });

    let expected: Vec<_> = (1..=6).map(|m| (at(10, m, 0), f64::from(m))).collect();
    assert_eq!(minute_values(&store), expected);
}

#[test]
fn off_grid_samples_produce_whole_minutes_only() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 30), 0.0), (at(10, 2, 30), 120.0)]);

    let report = upsample(&mut store, &mut mapping, 0).unwrap();
    assert_eq!(report.generated, 2);
    assert_eq!(minute_values(&store), vec![(at(10, 1, 0), 30.0), (at(10, 2, 0), 90.0)]);
}

#[test]
fn only_fields_numeric_on_both_sides_are_interpolated() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    let mut left = diagram_record(Raw, at(10, 0, 0), 0.0);
    left.set("humidity", 40_i64);
    left.set("station", "north");
    let mut right = diagram_record(Raw, at(10, 2, 0), 2.0);
    right.set("station", "north");
    store.insert_all(common::DIAGRAM, [left, right]);

    upsample(&mut store, &mut mapping, 0).unwrap();
    let minute = &level_records(&store, Minute)[0];
    assert_eq!(temperature(minute), 1.0);
    assert!(minute.field("humidity").is_none());
    assert!(minute.field("station").is_none());
}

#[test]
fn a_single_sample_is_not_enough() {
    let mut mapping = weather_mapping();
    let mut store = memory_store(&mapping);
    raw(&mut store, &[(at(10, 0, 0), 0.0)]);

    let report = upsample(&mut store, &mut mapping, 0).unwrap();
    assert_eq!(report, ResampleReport { read: 1, generated: 0 });
    assert_eq!(mapping.cursor(Minute).unwrap().last_measurement_time, None);
}

#[test]
fn missing_minute_cursor_is_a_configuration_error() {
    let mut mapping = Mapping::from_parts(1, common::SOURCE_TYPE, common::DIAGRAM, common::weather_fields(), vec![]);
    let mut store = MemoryStore::new();
    let err = upsample(&mut store, &mut mapping, 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConsolidationError>(),
        Some(ConsolidationError::MissingCursor { level: Minute, .. })
    ));
}
