//! Mappings: which source record type feeds which diagram, and how.
//!
//! A [`Mapping`] owns its [`FieldMapping`]s (copy rules) and one
//! [`ConsolidationCursor`] per non-RAW level. Nothing points back from a
//! field mapping or cursor to its mapping; the mapping id is carried by value.
//!
//! Persistence lives in [`repo`], TOML configuration in [`config`], and the
//! idempotent configuration → database sync in [`sync`].

pub mod config;
pub mod repo;
pub mod sync;

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;

use crate::level::ConsolidationLevel;
use crate::record::MEASUREMENT_TIME;

/// Copy rule: read `source_field` from a source record, write `target_field`
/// on the diagram record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMapping {
    /// Field read from the source record.
    pub source_field: String,
    /// Field written on the diagram record.
    pub target_field: String,
}

impl FieldMapping {
    /// New copy rule.
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
        }
    }
}

/// Watermark of one (mapping, level): the last measurement time already processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationCursor {
    /// Owning mapping.
    pub mapping_id: i64,
    /// Level the watermark applies to; never RAW.
    pub level: ConsolidationLevel,
    /// `None` until the first successful run.
    pub last_measurement_time: Option<DateTime<Utc>>,
}

impl ConsolidationCursor {
    /// A cursor that has never run.
    pub fn new(mapping_id: i64, level: ConsolidationLevel) -> Self {
        Self {
            mapping_id,
            level,
            last_measurement_time: None,
        }
    }
}

/// A source type → diagram type pairing with its copy rules and cursors.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    /// Storage id.
    pub id: i64,
    /// Source record type; also the provenance written to diagram records.
    pub source_type: String,
    /// Diagram record type.
    pub diagram_type: String,
    field_mappings: Vec<FieldMapping>,
    cursors: Vec<ConsolidationCursor>,
}

impl Mapping {
    /// A freshly created mapping: one never-run cursor per non-RAW level.
    pub fn new(
        id: i64,
        source_type: impl Into<String>,
        diagram_type: impl Into<String>,
        field_mappings: Vec<FieldMapping>,
    ) -> Self {
        let cursors = ConsolidationLevel::RESAMPLED
            .iter()
            .map(|&level| ConsolidationCursor::new(id, level))
            .collect();
        Self::from_parts(id, source_type, diagram_type, field_mappings, cursors)
    }

    /// Reassemble a mapping from stored parts. Cursors are kept as given;
    /// a missing cursor is a configuration error surfaced when it is needed.
    pub fn from_parts(
        id: i64,
        source_type: impl Into<String>,
        diagram_type: impl Into<String>,
        field_mappings: Vec<FieldMapping>,
        cursors: Vec<ConsolidationCursor>,
    ) -> Self {
        Self {
            id,
            source_type: source_type.into(),
            diagram_type: diagram_type.into(),
            field_mappings,
            cursors,
        }
    }

    /// Copy rules in configuration order.
    pub fn field_mappings(&self) -> &[FieldMapping] {
        &self.field_mappings
    }

    /// Source field that feeds `diagram_field`, if mapped.
    pub fn resolve_field_accessor(&self, diagram_field: &str) -> Option<&str> {
        self.field_mappings
            .iter()
            .find(|fm| fm.target_field == diagram_field)
            .map(|fm| fm.source_field.as_str())
    }

    /// Source field holding the measurement time.
    pub fn source_time_field(&self) -> Option<&str> {
        self.resolve_field_accessor(MEASUREMENT_TIME)
    }

    /// All cursors.
    pub fn cursors(&self) -> &[ConsolidationCursor] {
        &self.cursors
    }

    /// Cursor for `level`.
    pub fn cursor(&self, level: ConsolidationLevel) -> Option<&ConsolidationCursor> {
        self.cursors.iter().find(|c| c.level == level)
    }

    /// Mutable cursor for `level`.
    pub fn cursor_mut(&mut self, level: ConsolidationLevel) -> Option<&mut ConsolidationCursor> {
        self.cursors.iter_mut().find(|c| c.level == level)
    }
}

/// Result type used throughout the mapping repository.
pub type RepoResult<T> = anyhow::Result<T>;

/// Portable surface, SQLite implementation lives in `repo.rs`.
pub trait MappingRepo {
    /// Create a mapping with its field mappings and one cursor per non-RAW level.
    fn create_mapping(
        &self,
        conn: &mut SqliteConnection,
        source_type: &str,
        diagram_type: &str,
        field_mappings: &[FieldMapping],
    ) -> RepoResult<Mapping>;

    /// Insert or update the mapping for (source_type, diagram_type), replace its
    /// field mappings and create any missing cursor. Existing watermarks are kept.
    fn upsert_mapping(
        &self,
        conn: &mut SqliteConnection,
        source_type: &str,
        diagram_type: &str,
        field_mappings: &[FieldMapping],
    ) -> RepoResult<Mapping>;

    /// Load one mapping with its field mappings and cursors.
    fn load_mapping(&self, conn: &mut SqliteConnection, mapping_id: i64) -> RepoResult<Option<Mapping>>;

    /// All mappings of a diagram type, optionally restricted to one source type.
    fn find_mappings(
        &self,
        conn: &mut SqliteConnection,
        diagram_type: &str,
        source_type: Option<&str>,
    ) -> RepoResult<Vec<Mapping>>;

    /// Every mapping, ordered by id.
    fn list_mappings(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Mapping>>;

    /// Delete a mapping; field mappings and cursors cascade.
    fn delete_mapping(&self, conn: &mut SqliteConnection, mapping_id: i64) -> RepoResult<bool>;

    /// Persist a cursor's watermark.
    fn save_cursor(&self, conn: &mut SqliteConnection, cursor: &ConsolidationCursor) -> RepoResult<()>;
}
