//! SQLite persistence for mappings, field mappings and cursors.

use anyhow::Context;
use diesel::prelude::*;

use crate::{
    consolidate::ConsolidationError,
    level::ConsolidationLevel,
    mapping::{ConsolidationCursor, FieldMapping, Mapping, MappingRepo, RepoResult},
    models::{CursorRow, EntityMappingRow, FieldMappingRow, NewCursor, NewEntityMapping, NewFieldMapping},
    schema::{consolidation_cursor, entity_mapping, field_mapping},
    tz,
};

use crate::schema::consolidation_cursor::dsl as cc;
use crate::schema::entity_mapping::dsl as em;
use crate::schema::field_mapping::dsl as fm;

/// Repository for mappings, field mappings and cursors in a SQLite database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteMappingRepo;

impl SqliteMappingRepo {
    /// Stateless; every call takes the connection explicitly.
    pub fn new() -> Self {
        Self
    }
}

fn insert_field_mappings(
    conn: &mut SqliteConnection,
    mapping_id: i64,
    field_mappings: &[FieldMapping],
) -> QueryResult<()> {
    if field_mappings.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewFieldMapping<'_>> = field_mappings
        .iter()
        .map(|f| NewFieldMapping {
            mapping_id,
            source_field: &f.source_field,
            target_field: &f.target_field,
        })
        .collect();
    diesel::insert_into(field_mapping::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

// idempotent: existing watermarks are left alone
fn ensure_cursors(conn: &mut SqliteConnection, mapping_id: i64) -> QueryResult<()> {
    for level in ConsolidationLevel::RESAMPLED {
        diesel::insert_into(consolidation_cursor::table)
            .values(NewCursor {
                mapping_id,
                level: level.code(),
                last_measurement_time: None,
            })
            .on_conflict((cc::mapping_id, cc::level))
            .do_nothing()
            .execute(conn)?;
    }
    Ok(())
}

fn cursor_from_row(row: CursorRow) -> RepoResult<ConsolidationCursor> {
    let level = ConsolidationLevel::from_code(i64::from(row.level))?;
    let last_measurement_time = row
        .last_measurement_time
        .as_deref()
        .map(tz::parse_ts_to_utc)
        .transpose()
        .with_context(|| format!("cursor {} has a bad watermark", row.id))?;
    Ok(ConsolidationCursor {
        mapping_id: row.mapping_id,
        level,
        last_measurement_time,
    })
}

fn assemble(conn: &mut SqliteConnection, row: EntityMappingRow) -> RepoResult<Mapping> {
    let fields: Vec<FieldMappingRow> = FieldMappingRow::belonging_to(&row)
        .order(fm::id.asc())
        .select(FieldMappingRow::as_select())
        .load(conn)?;
    let cursors: Vec<CursorRow> = CursorRow::belonging_to(&row)
        .order(cc::level.asc())
        .select(CursorRow::as_select())
        .load(conn)?;

    let field_mappings = fields
        .into_iter()
        .map(|f| FieldMapping::new(f.source_field, f.target_field))
        .collect();
    let cursors = cursors
        .into_iter()
        .map(cursor_from_row)
        .collect::<RepoResult<Vec<_>>>()?;

    Ok(Mapping::from_parts(
        row.id,
        row.source_type,
        row.diagram_type,
        field_mappings,
        cursors,
    ))
}

impl MappingRepo for SqliteMappingRepo {
    fn create_mapping(
        &self,
        conn: &mut SqliteConnection,
        source_type: &str,
        diagram_type: &str,
        field_mappings: &[FieldMapping],
    ) -> RepoResult<Mapping> {
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let row: EntityMappingRow = diesel::insert_into(entity_mapping::table)
                .values(NewEntityMapping {
                    source_type,
                    diagram_type,
                })
                .returning(EntityMappingRow::as_returning())
                .get_result(conn)
                .with_context(|| format!("creating mapping {source_type} -> {diagram_type}"))?;

            insert_field_mappings(conn, row.id, field_mappings)?;
            ensure_cursors(conn, row.id)?;
            assemble(conn, row)
        })
    }

    fn upsert_mapping(
        &self,
        conn: &mut SqliteConnection,
        source_type: &str,
        diagram_type: &str,
        field_mappings: &[FieldMapping],
    ) -> RepoResult<Mapping> {
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let new_row = NewEntityMapping {
                source_type,
                diagram_type,
            };
            // Insert .. ON CONFLICT (..) DO UPDATE .. RETURNING (Sqlite 3.35+)
            let row: EntityMappingRow = diesel::insert_into(entity_mapping::table)
                .values(&new_row)
                .on_conflict((em::source_type, em::diagram_type))
                .do_update()
                .set(&new_row)
                .returning(EntityMappingRow::as_returning())
                .get_result(conn)?;

            diesel::delete(fm::field_mapping.filter(fm::mapping_id.eq(row.id))).execute(conn)?;
            insert_field_mappings(conn, row.id, field_mappings)?;
            ensure_cursors(conn, row.id)?;
            assemble(conn, row)
        })
    }

    fn load_mapping(&self, conn: &mut SqliteConnection, mapping_id: i64) -> RepoResult<Option<Mapping>> {
        let row = em::entity_mapping
            .find(mapping_id)
            .select(EntityMappingRow::as_select())
            .first(conn)
            .optional()?;
        row.map(|r| assemble(conn, r)).transpose()
    }

    fn find_mappings(
        &self,
        conn: &mut SqliteConnection,
        diagram_type: &str,
        source_type: Option<&str>,
    ) -> RepoResult<Vec<Mapping>> {
        let mut query = em::entity_mapping
            .filter(em::diagram_type.eq(diagram_type))
            .into_boxed();
        if let Some(source) = source_type {
            query = query.filter(em::source_type.eq(source));
        }
        let rows: Vec<EntityMappingRow> = query
            .order(em::id.asc())
            .select(EntityMappingRow::as_select())
            .load(conn)?;
        rows.into_iter().map(|r| assemble(conn, r)).collect()
    }

    fn list_mappings(&self, conn: &mut SqliteConnection) -> RepoResult<Vec<Mapping>> {
        let rows: Vec<EntityMappingRow> = em::entity_mapping
            .order(em::id.asc())
            .select(EntityMappingRow::as_select())
            .load(conn)?;
        rows.into_iter().map(|r| assemble(conn, r)).collect()
    }

    fn delete_mapping(&self, conn: &mut SqliteConnection, mapping_id: i64) -> RepoResult<bool> {
        let n = diesel::delete(em::entity_mapping.find(mapping_id)).execute(conn)?;
        Ok(n > 0)
    }

    fn save_cursor(&self, conn: &mut SqliteConnection, cursor: &ConsolidationCursor) -> RepoResult<()> {
        let watermark = cursor.last_measurement_time.map(tz::to_rfc3339_millis);
        let n = diesel::update(
            cc::consolidation_cursor.filter(
                cc::mapping_id
                    .eq(cursor.mapping_id)
                    .and(cc::level.eq(cursor.level.code())),
            ),
        )
        .set(cc::last_measurement_time.eq(watermark))
        .execute(conn)?;

        if n == 0 {
            return Err(ConsolidationError::MissingCursor {
                mapping_id: cursor.mapping_id,
                level: cursor.level,
            }
            .into());
        }
        Ok(())
    }
}
