#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use diagram_sync::db::{connection, migrate};
use diagram_sync::level::ConsolidationLevel;
use diagram_sync::mapping::{FieldMapping, Mapping};
use diagram_sync::record::{MEASUREMENT_TIME, Record, Value};
use diagram_sync::store::memory::MemoryStore;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub const SOURCE_TYPE: &str = "station_reading";
pub const DIAGRAM: &str = "weather";

/// 2024-01-01 at the given UTC wall time.
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

pub fn weather_fields() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new("recorded_at", MEASUREMENT_TIME),
        FieldMapping::new("temp_c", "temperature"),
    ]
}

/// Mapping 1: station_reading -> weather, with all cursors unset.
pub fn weather_mapping() -> Mapping {
    Mapping::new(1, SOURCE_TYPE, DIAGRAM, weather_fields())
}

/// Memory store that knows the mapping's cursors.
pub fn memory_store(mapping: &Mapping) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.register_cursors(mapping.cursors());
    store
}

pub fn source_reading(t: DateTime<Utc>, temp: f64) -> Record {
    Record::from_fields([("recorded_at", Value::from(t)), ("temp_c", Value::from(temp))])
}

/// A diagram record of the weather mapping's provenance.
pub fn diagram_record(level: ConsolidationLevel, t: DateTime<Utc>, temp: f64) -> Record {
    let mut r = Record::from_fields([("temperature", temp)]);
    r.stamp(SOURCE_TYPE, level, t);
    r
}

/// Records of one level, ascending by measurement time.
pub fn level_records(store: &MemoryStore, level: ConsolidationLevel) -> Vec<Record> {
    let mut out: Vec<Record> = store
        .records(DIAGRAM)
        .iter()
        .filter(|r| r.consolidation_level() == Some(level))
        .cloned()
        .collect();
    out.sort_by_key(|r| r.measurement_time());
    out
}

pub fn temperature(r: &Record) -> f64 {
    r.field("temperature").and_then(Value::as_f64).expect("numeric temperature")
}
