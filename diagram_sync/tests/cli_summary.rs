mod common;

use common::at;
use diagram_sync::consolidate::{
    ConsolidationError, ResampleReport, TranslateReport, resample_summary, translate_summary,
};
use diagram_sync::level::ConsolidationLevel;
use diagram_sync::mapping::sync::SyncReport;
use insta::assert_snapshot;

#[test]
fn resample_line() {
    let report = ResampleReport { read: 120, generated: 2 };
    assert_snapshot!(resample_summary(3, ConsolidationLevel::Hour, &report), @"mapping 3 level hour: read 120, generated 2");
}

#[test]
fn translate_line() {
    let known = TranslateReport {
        last_known_measurement_time: Some(at(10, 0, 0)),
        translated: 40,
    };
    assert_snapshot!(translate_summary(3, &known), @"mapping 3: translated 40 (last known 2024-01-01T10:00:00.000Z)");

    let first = TranslateReport {
        last_known_measurement_time: None,
        translated: 0,
    };
    assert_snapshot!(translate_summary(7, &first), @"mapping 7: translated 0 (last known none)");
}

#[test]
fn sync_line() {
    let report = SyncReport {
        created: vec![("station_reading".into(), "weather".into())],
        unchanged: 2,
        ..Default::default()
    };
    assert_snapshot!(report.to_string(), @"created 1, updated 0, unchanged 2, pruned 0");
}

#[test]
fn no_matching_mappings_message() {
    let with_source = ConsolidationError::NoMatchingMappings {
        diagram_type: "weather".into(),
        source_type: Some("buoy".into()),
    };
    assert_snapshot!(with_source.to_string(), @"no mappings for diagram type weather and data source buoy");

    let any_source = ConsolidationError::NoMatchingMappings {
        diagram_type: "weather".into(),
        source_type: None,
    };
    assert_snapshot!(any_source.to_string(), @"no mappings for diagram type weather");
}
