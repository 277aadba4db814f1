mod common;

use common::{at, setup_db};
use diagram_sync::level::ConsolidationLevel;
use diagram_sync::mapping::config::load_catalog_str;
use diagram_sync::mapping::repo::SqliteMappingRepo;
use diagram_sync::mapping::sync::{SyncOptions, sync_mappings};
use diagram_sync::mapping::{FieldMapping, MappingRepo};

const CATALOG: &str = r#"
    [[mapping]]
    source_type = "station_reading"
    diagram_type = "weather"
    [mapping.fields]
    recorded_at = "measurement_time"
    temp_c = "temperature"

    [[mapping]]
    source_type = "buoy_reading"
    diagram_type = "weather"
    [mapping.fields]
    ts = "measurement_time"
    water_temp = "temperature"
"#;

const STATION_ONLY_WITH_HUMIDITY: &str = r#"
    [[mapping]]
    source_type = "station_reading"
    diagram_type = "weather"
    [mapping.fields]
    recorded_at = "measurement_time"
    temp_c = "temperature"
    rh = "humidity"
"#;

fn pair(s: &str, d: &str) -> (String, String) {
    (s.to_string(), d.to_string())
}

#[test]
fn first_sync_creates_mappings_with_cursors() {
    let (_db, mut conn) = setup_db();
    let report = sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), SyncOptions::default()).unwrap();
    assert_eq!(
        report.created,
        vec![pair("station_reading", "weather"), pair("buoy_reading", "weather")]
    );

    let stored = SqliteMappingRepo::new().list_mappings(&mut conn).unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|m| m.cursors().len() == ConsolidationLevel::RESAMPLED.len()));
    assert_eq!(stored[1].source_time_field(), Some("ts"));
}

#[test]
fn resync_is_a_no_op() {
    let (_db, mut conn) = setup_db();
    sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), SyncOptions::default()).unwrap();
    let before = SqliteMappingRepo::new().list_mappings(&mut conn).unwrap();

    let report = sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), SyncOptions::default()).unwrap();
    assert_eq!(report.unchanged, 2);
    assert!(report.created.is_empty() && report.updated.is_empty() && report.pruned.is_empty());
    assert_eq!(SqliteMappingRepo::new().list_mappings(&mut conn).unwrap(), before);
}

#[test]
fn changed_fields_are_replaced_and_watermarks_survive() {
    let (_db, mut conn) = setup_db();
    let repo = SqliteMappingRepo::new();
    sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), SyncOptions::default()).unwrap();

    let station = repo.find_mappings(&mut conn, "weather", Some("station_reading")).unwrap().remove(0);
    let mut hour = station.cursor(ConsolidationLevel::Hour).unwrap().clone();
    hour.last_measurement_time = Some(at(10, 0, 0));
    repo.save_cursor(&mut conn, &hour).unwrap();

    let report = sync_mappings(
        &mut conn,
        load_catalog_str(STATION_ONLY_WITH_HUMIDITY).unwrap(),
        SyncOptions::default(),
    )
    .unwrap();
    assert_eq!(report.updated, vec![pair("station_reading", "weather")]);
    assert!(report.pruned.is_empty(), "nothing is pruned without --prune");

    let station = repo.load_mapping(&mut conn, station.id).unwrap().unwrap();
    assert_eq!(station.resolve_field_accessor("humidity"), Some("rh"));
    assert_eq!(station.cursor(ConsolidationLevel::Hour), Some(&hour));
    assert_eq!(repo.list_mappings(&mut conn).unwrap().len(), 2);
}

#[test]
fn dry_run_reports_without_writing() {
    let (_db, mut conn) = setup_db();
    let opt = SyncOptions { dry_run: true, prune: true };
    let report = sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), opt).unwrap();
    assert_eq!(report.created.len(), 2);
    assert!(SqliteMappingRepo::new().list_mappings(&mut conn).unwrap().is_empty());
}

#[test]
fn prune_deletes_unlisted_mappings() {
    let (_db, mut conn) = setup_db();
    sync_mappings(&mut conn, load_catalog_str(CATALOG).unwrap(), SyncOptions::default()).unwrap();

    let opt = SyncOptions { dry_run: false, prune: true };
    let report = sync_mappings(&mut conn, load_catalog_str(STATION_ONLY_WITH_HUMIDITY).unwrap(), opt).unwrap();
    assert_eq!(report.pruned, vec![pair("buoy_reading", "weather")]);

    let left = SqliteMappingRepo::new().list_mappings(&mut conn).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(
        left[0].field_mappings().last(),
        Some(&FieldMapping::new("rh", "humidity"))
    );
}
