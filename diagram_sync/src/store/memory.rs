//! In-memory [`RecordStore`] and [`CursorStore`].

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::level::ConsolidationLevel;
use crate::mapping::ConsolidationCursor;
use crate::record::{Record, Value};
use crate::store::{CursorStore, Order, Query, RecordStore, StoreError, StoreResult, compare};

/// Record collections and cursors kept in process memory.
///
/// Ids are assigned on commit, starting at 1 and shared across collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Record>>,
    pending: Vec<(String, Record)>,
    next_id: i64,
    cursors: HashMap<(i64, ConsolidationLevel), Option<chrono::DateTime<chrono::Utc>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records immediately, bypassing staging. Returns the assigned ids.
    pub fn insert_all(&mut self, record_type: &str, records: impl IntoIterator<Item = Record>) -> Vec<i64> {
        records
            .into_iter()
            .map(|mut record| {
                let id = self.allocate_id();
                record.set_id(id);
                self.collections
                    .entry(record_type.to_string())
                    .or_default()
                    .push(record);
                id
            })
            .collect()
    }

    /// All committed records of a collection, in id order.
    pub fn records(&self, record_type: &str) -> &[Record] {
        self.collections
            .get(record_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Register the cursor rows a mapping owns so that saves succeed.
    pub fn register_cursors<'a>(&mut self, cursors: impl IntoIterator<Item = &'a ConsolidationCursor>) {
        for c in cursors {
            self.cursors
                .insert((c.mapping_id, c.level), c.last_measurement_time);
        }
    }

    /// Persisted watermark of a registered cursor.
    pub fn cursor(&self, mapping_id: i64, level: ConsolidationLevel) -> Option<ConsolidationCursor> {
        self.cursors
            .get(&(mapping_id, level))
            .map(|&last_measurement_time| ConsolidationCursor {
                mapping_id,
                level,
                last_measurement_time,
            })
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn sort_key_cmp(a: &Record, b: &Record, field: &str) -> Ordering {
    let va = a.get(field).unwrap_or(Value::Null);
    let vb = b.get(field).unwrap_or(Value::Null);
    // nulls first, like SQLite
    match (va.is_null(), vb.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(&va, &vb).unwrap_or(Ordering::Equal),
    }
}

impl RecordStore for MemoryStore {
    fn query(&mut self, record_type: &str, query: &Query) -> StoreResult<Vec<Record>> {
        let mut hits: Vec<&Record> = self
            .records(record_type)
            .iter()
            .filter(|r| query.filters.iter().all(|f| f.matches(r)))
            .collect();

        if let Some((field, order)) = &query.order_by {
            // stable: ties stay in id order
            hits.sort_by(|a, b| {
                let ord = sort_key_cmp(a, b, field);
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }

        Ok(hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn stage(&mut self, record_type: &str, record: Record) {
        self.pending.push((record_type.to_string(), record));
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn commit(&mut self) -> StoreResult<usize> {
        let batch = std::mem::take(&mut self.pending);
        // validate before touching anything so a failed commit writes nothing
        for (record_type, record) in &batch {
            if let Some(id) = record.id() {
                if !self.records(record_type).iter().any(|r| r.id() == Some(id)) {
                    return Err(StoreError::MissingRecord(id).into());
                }
            }
        }

        let written = batch.len();
        for (record_type, mut record) in batch {
            match record.id() {
                Some(id) => {
                    let stored = self
                        .collections
                        .get_mut(&record_type)
                        .and_then(|rows| rows.iter_mut().find(|r| r.id() == Some(id)))
                        .ok_or(StoreError::MissingRecord(id))?;
                    *stored = record;
                }
                None => {
                    let id = self.allocate_id();
                    record.set_id(id);
                    self.collections.entry(record_type).or_default().push(record);
                }
            }
        }
        Ok(written)
    }
}

impl CursorStore for MemoryStore {
    fn save_cursor(&mut self, cursor: &ConsolidationCursor) -> StoreResult<()> {
        match self.cursors.get_mut(&(cursor.mapping_id, cursor.level)) {
            Some(slot) => {
                *slot = cursor.last_measurement_time;
                Ok(())
            }
            None => Err(crate::consolidate::ConsolidationError::MissingCursor {
                mapping_id: cursor.mapping_id,
                level: cursor.level,
            }
            .into()),
        }
    }
}
