//! Record storage surface used by the consolidation engine.
//!
//! The engine only needs ordered range queries over one named record
//! collection, a way to stage writes, and a batch commit. [`RecordStore`]
//! captures exactly that; [`CursorStore`] persists consolidation watermarks.
//!
//! Implementations:
//! - [`memory::MemoryStore`]: in-process, used by tests and dry runs.
//! - [`sqlite::SqliteStore`]: durable, records kept as JSON field maps.

pub mod memory;
pub mod sqlite;

use std::cmp::Ordering;

use crate::mapping::ConsolidationCursor;
use crate::record::{Record, Value};

#[derive(thiserror::Error, Debug)]
/// Errors raised by record stores.
pub enum StoreError {
    #[error("field name {0:?} is not usable in a query")]
    /// Field names must be plain identifiers to be addressable in storage.
    BadFieldName(String),
    #[error("cannot encode record fields: {0}")]
    /// The field map could not be (de)serialized.
    Encoding(#[from] serde_json::Error),
    #[error("record {0} does not exist")]
    /// An update targeted a record id that is not stored.
    MissingRecord(i64),
}

/// Result type used by stores.
pub type StoreResult<T> = anyhow::Result<T>;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// One condition on a named field. Conditions are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value` (`Null` matches missing/null fields).
    Eq(String, Value),
    /// `field > value`
    Gt(String, Value),
    /// `field >= value`
    Ge(String, Value),
    /// `field < value`
    Lt(String, Value),
    /// `field <= value`
    Le(String, Value),
}

impl Filter {
    /// Field the condition applies to.
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(f, _) | Filter::Gt(f, _) | Filter::Ge(f, _) | Filter::Lt(f, _) | Filter::Le(f, _) => f,
        }
    }

    /// Evaluate against an in-memory record.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(self.field()).unwrap_or(Value::Null);
        match self {
            Filter::Eq(_, expected) => {
                if expected.is_null() {
                    actual.is_null()
                } else {
                    compare(&actual, expected) == Some(Ordering::Equal)
                }
            }
            Filter::Gt(_, v) => compare(&actual, v) == Some(Ordering::Greater),
            Filter::Ge(_, v) => matches!(compare(&actual, v), Some(Ordering::Greater | Ordering::Equal)),
            Filter::Lt(_, v) => compare(&actual, v) == Some(Ordering::Less),
            Filter::Le(_, v) => matches!(compare(&actual, v), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Compare two values the way SQLite compares the stored JSON scalars:
/// numbers and timestamps (as Unix seconds) numerically, text lexically,
/// anything involving null or mixed kinds is unordered.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (scalar(a)?, scalar(b)?) {
        (Scalar::Num(x), Scalar::Num(y)) => x.partial_cmp(&y),
        (Scalar::Text(x), Scalar::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

enum Scalar<'a> {
    Num(f64),
    Text(&'a str),
}

fn scalar(v: &Value) -> Option<Scalar<'_>> {
    match v {
        Value::Integer(i) => Some(Scalar::Num(*i as f64)),
        Value::Float(f) => Some(Scalar::Num(*f)),
        Value::Timestamp(t) => Some(Scalar::Num(t.timestamp() as f64)),
        Value::Text(s) => Some(Scalar::Text(s)),
        Value::Null => None,
    }
}

/// A filtered, ordered, limited read of one record collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conditions, all of which must hold.
    pub filters: Vec<Filter>,
    /// Optional sort field and direction; ties keep storage (id) order.
    pub order_by: Option<(String, Order)>,
    /// Maximum number of records, `None` for unbounded.
    pub limit: Option<usize>,
    /// Number of leading matches to skip.
    pub offset: usize,
}

impl Query {
    /// Unfiltered, unordered, unbounded query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// Add `field > value`.
    pub fn gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(field.to_string(), value.into()));
        self
    }

    /// Add `field >= value`.
    pub fn ge(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ge(field.to_string(), value.into()));
        self
    }

    /// Add `field < value`.
    pub fn lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(field.to_string(), value.into()));
        self
    }

    /// Add `field <= value`.
    pub fn le(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Le(field.to_string(), value.into()));
        self
    }

    /// Add `field > value` when a lower bound is known.
    pub fn gt_opt(self, field: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.gt(field, v),
            None => self,
        }
    }

    /// Sort by `field`.
    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.order_by = Some((field.to_string(), order));
        self
    }

    /// Cap the result size; `0` means unbounded.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Skip the first `offset` matches.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Every field name the query refers to.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(Filter::field)
            .chain(self.order_by.iter().map(|(f, _)| f.as_str()))
    }
}

/// Generic ordered range query + batched persistence over named record collections.
pub trait RecordStore {
    /// Records of `record_type` matching `query`, in the query's order.
    fn query(&mut self, record_type: &str, query: &Query) -> StoreResult<Vec<Record>>;

    /// Mark a record for writing. Records without an id are inserted on
    /// commit, records with an id replace the stored version.
    fn stage(&mut self, record_type: &str, record: Record);

    /// Number of staged, uncommitted writes.
    fn pending(&self) -> usize;

    /// Flush all staged writes as one batch. Returns the number written.
    fn commit(&mut self) -> StoreResult<usize>;

    /// First record matching `query`, if any.
    fn query_one(&mut self, record_type: &str, query: &Query) -> StoreResult<Option<Record>> {
        let q = query.clone().limit(1);
        Ok(self.query(record_type, &q)?.into_iter().next())
    }
}

/// Persistence of consolidation watermarks.
pub trait CursorStore {
    /// Store the cursor's `last_measurement_time`; the cursor row must exist.
    fn save_cursor(&mut self, cursor: &ConsolidationCursor) -> StoreResult<()>;
}
