//! SQLite [`RecordStore`] keeping every record as a JSON field map.
//!
//! All collections share the `record` table; a row is
//! `(id, record_type, fields)` where `fields` is the serialized
//! [`Fields`](crate::record::Fields) map (`{"temp": {"type": "float", "value": 21.5}}`).
//! Filters and ordering address `json_extract(fields, '$."<name>".value')`,
//! which yields SQLite integers for integer and timestamp values, reals for
//! floats, text for text and NULL for missing or null fields.
//!
//! Field names are spliced into SQL, so they are restricted to
//! `[A-Za-z0-9_]+` and anything else is rejected with
//! [`StoreError::BadFieldName`]. Values are always bound.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Text};
use diesel::sqlite::Sqlite;

use crate::mapping::repo::SqliteMappingRepo;
use crate::mapping::{ConsolidationCursor, MappingRepo};
use crate::models::NewRecordRow;
use crate::record::{Fields, ID, Record, Value};
use crate::schema::record;
use crate::store::{CursorStore, Filter, Order, Query, RecordStore, StoreError, StoreResult};

#[derive(QueryableByName)]
struct RecordRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    fields: String,
}

/// Record store over a borrowed SQLite connection.
///
/// Writes are staged in memory and flushed by [`RecordStore::commit`] in one
/// `IMMEDIATE` transaction.
pub struct SqliteStore<'c> {
    conn: &'c mut SqliteConnection,
    pending: Vec<(String, Record)>,
}

impl<'c> SqliteStore<'c> {
    /// Wrap an open (and migrated) connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self {
            conn,
            pending: Vec::new(),
        }
    }

    /// The underlying connection, e.g. for mapping lookups between runs.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.conn
    }
}

fn check_field_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok { Ok(()) } else { Err(StoreError::BadFieldName(name.to_string())) }
}

/// SQL expression addressing a field; `id` is the row id.
fn field_expr(name: &str) -> String {
    if name == ID {
        "id".to_string()
    } else {
        format!("json_extract(fields, '$.\"{name}\".value')")
    }
}

type BoxedQuery<'f> = diesel::query_builder::BoxedSqlQuery<'f, Sqlite, diesel::query_builder::SqlQuery>;

fn bind_value<'f>(q: BoxedQuery<'f>, value: &Value) -> BoxedQuery<'f> {
    match value {
        Value::Integer(i) => q.sql("?").bind::<BigInt, _>(*i),
        Value::Timestamp(t) => q.sql("?").bind::<BigInt, _>(t.timestamp()),
        Value::Float(f) => q.sql("?").bind::<Double, _>(*f),
        Value::Text(s) => q.sql("?").bind::<Text, _>(s.clone()),
        // comparisons against NULL never hold
        Value::Null => q.sql("NULL"),
    }
}

fn push_filter<'f>(q: BoxedQuery<'f>, filter: &Filter) -> BoxedQuery<'f> {
    let expr = field_expr(filter.field());
    let (op, value) = match filter {
        Filter::Eq(_, v) if v.is_null() => return q.sql(format!(" AND {expr} IS NULL")),
        Filter::Eq(_, v) => ("=", v),
        Filter::Gt(_, v) => (">", v),
        Filter::Ge(_, v) => (">=", v),
        Filter::Lt(_, v) => ("<", v),
        Filter::Le(_, v) => ("<=", v),
    };
    bind_value(q.sql(format!(" AND {expr} {op} ")), value)
}

fn decode(row: RecordRow) -> StoreResult<Record> {
    let fields: Fields = serde_json::from_str(&row.fields).map_err(StoreError::Encoding)?;
    Ok(Record::with_id(row.id, fields))
}

fn encode(record: &Record) -> StoreResult<String> {
    Ok(serde_json::to_string(record.fields()).map_err(StoreError::Encoding)?)
}

impl RecordStore for SqliteStore<'_> {
    fn query(&mut self, record_type: &str, query: &Query) -> StoreResult<Vec<Record>> {
        for name in query.field_names() {
            check_field_name(name)?;
        }

        let mut q = diesel::sql_query("SELECT id, fields FROM record WHERE record_type = ")
            .into_boxed::<Sqlite>()
            .sql("?")
            .bind::<Text, _>(record_type.to_string());
        for filter in &query.filters {
            q = push_filter(q, filter);
        }
        match &query.order_by {
            Some((field, order)) => {
                let dir = match order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                q = q.sql(format!(" ORDER BY {} {dir}, id ASC", field_expr(field)));
            }
            None => q = q.sql(" ORDER BY id ASC"),
        }
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded
        let limit = query.limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        q = q
            .sql(" LIMIT ")
            .sql("?")
            .bind::<BigInt, _>(limit)
            .sql(" OFFSET ")
            .sql("?")
            .bind::<BigInt, _>(offset);

        let rows: Vec<RecordRow> = q.load(&mut *self.conn)?;
        rows.into_iter().map(decode).collect()
    }

    fn stage(&mut self, record_type: &str, record: Record) {
        self.pending.push((record_type.to_string(), record));
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn commit(&mut self) -> StoreResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.pending);
        self.conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            for (record_type, rec) in &batch {
                let json = encode(rec)?;
                match rec.id() {
                    None => {
                        diesel::insert_into(record::table)
                            .values(NewRecordRow {
                                record_type,
                                fields: &json,
                            })
                            .execute(conn)?;
                    }
                    Some(id) => {
                        let n = diesel::update(
                            record::table
                                .find(id)
                                .filter(record::record_type.eq(record_type.as_str())),
                        )
                        .set(record::fields.eq(json.as_str()))
                        .execute(conn)?;
                        if n == 0 {
                            return Err(StoreError::MissingRecord(id).into());
                        }
                    }
                }
            }
            Ok(batch.len())
        })
    }
}

impl CursorStore for SqliteStore<'_> {
    fn save_cursor(&mut self, cursor: &ConsolidationCursor) -> StoreResult<()> {
        SqliteMappingRepo::new().save_cursor(&mut *self.conn, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_plain_identifiers() {
        assert!(check_field_name("measurement_time").is_ok());
        assert!(check_field_name("Temp2").is_ok());
        assert!(check_field_name("").is_err());
        assert!(check_field_name("a'b").is_err());
        assert!(check_field_name("a.b").is_err());
    }

    #[test]
    fn id_addresses_the_row_id() {
        assert_eq!(field_expr(ID), "id");
        assert_eq!(field_expr("temp"), "json_extract(fields, '$.\"temp\".value')");
    }
}
