//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel’s Queryable/Insertable APIs:
//! - [`crate::schema::entity_mapping`]: one source type → diagram type pairing
//! - [`crate::schema::field_mapping`]: field copy rules of a mapping
//! - [`crate::schema::consolidation_cursor`]: per (mapping, level) watermark
//! - [`crate::schema::record`]: generic record collection (JSON field maps)
//! - [`crate::schema::job_lock`]: advisory job leases
//!
//! Field mappings and cursors are removed with their mapping through
//! `ON DELETE CASCADE`.

use diesel::prelude::*;
use crate::schema::*;

/// A row in [`crate::schema::entity_mapping`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = entity_mapping, check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntityMappingRow {
    /// Database primary key.
    pub id: i64,
    /// Source record type (e.g., "station_reading").
    pub source_type: String,
    /// Diagram record type (e.g., "weather").
    pub diagram_type: String,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
}

/// Insertable form of [`EntityMappingRow`].
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = entity_mapping)]
pub struct NewEntityMapping<'a> {
    /// Source record type.
    pub source_type: &'a str,
    /// Diagram record type.
    pub diagram_type: &'a str,
}

/// A row in [`crate::schema::field_mapping`].
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = field_mapping, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(EntityMappingRow, foreign_key = mapping_id))]
pub struct FieldMappingRow {
    /// Database primary key.
    pub id: i64,
    /// FK to [`EntityMappingRow::id`].
    pub mapping_id: i64,
    /// Field read from the source record.
    pub source_field: String,
    /// Field written on the diagram record.
    pub target_field: String,
}

/// Insertable form of [`FieldMappingRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = field_mapping)]
pub struct NewFieldMapping<'a> {
    /// FK to [`EntityMappingRow::id`].
    pub mapping_id: i64,
    /// Field read from the source record.
    pub source_field: &'a str,
    /// Field written on the diagram record.
    pub target_field: &'a str,
}

/// A row in [`crate::schema::consolidation_cursor`].
///
/// `level` is a [`crate::level::ConsolidationLevel`] code in 1..=4.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = consolidation_cursor, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(EntityMappingRow, foreign_key = mapping_id))]
pub struct CursorRow {
    /// Database primary key.
    pub id: i64,
    /// FK to [`EntityMappingRow::id`].
    pub mapping_id: i64,
    /// Consolidation level code.
    pub level: i32,
    /// Last processed measurement time in RFC3339 UTC; NULL means never run.
    pub last_measurement_time: Option<String>,
    /// Last update timestamp in RFC3339 UTC (maintained by trigger).
    pub updated_at: String,
}

/// Insertable form of [`CursorRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = consolidation_cursor)]
pub struct NewCursor<'a> {
    /// FK to [`EntityMappingRow::id`].
    pub mapping_id: i64,
    /// Consolidation level code.
    pub level: i32,
    /// Initial watermark, normally `None`.
    pub last_measurement_time: Option<&'a str>,
}

/// Insertable form of a [`crate::schema::record`] row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = record)]
pub struct NewRecordRow<'a> {
    /// Collection name.
    pub record_type: &'a str,
    /// JSON object of typed field values.
    pub fields: &'a str,
}

/// A row in [`crate::schema::job_lock`]: one held advisory lease.
#[derive(Debug, Clone, Queryable, Insertable, Selectable)]
#[diesel(table_name = job_lock, check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobLockRow {
    /// Job name (e.g., "downsample").
    pub name: String,
    /// Lease owner identifier.
    pub owner: String,
    /// Acquisition time in RFC3339 UTC.
    pub acquired_at: String,
    /// Expiry time in RFC3339 UTC; expired leases may be taken over.
    pub expires_at: String,
}
