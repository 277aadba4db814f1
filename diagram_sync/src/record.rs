//! Generic records with named, typed fields.
//!
//! Both source records (whatever a data source delivers) and diagram records
//! are [`Record`]s: an optional storage id plus an ordered map of field name
//! to [`Value`]. Diagram records additionally carry the reserved fields
//! [`SOURCE`], [`MEASUREMENT_TIME`] and [`CONSOLIDATION_LEVEL`]; [`ID`] is the
//! storage identity and lives outside the field map.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::level::ConsolidationLevel;

/// Storage identity of a record.
pub const ID: &str = "id";
/// Provenance: the source record type a diagram record was derived from.
pub const SOURCE: &str = "source";
/// Time of the measurement, immutable once set.
pub const MEASUREMENT_TIME: &str = "measurement_time";
/// [`ConsolidationLevel`] code of a diagram record.
pub const CONSOLIDATION_LEVEL: &str = "consolidation_level";

/// Fields every diagram record has and that are never averaged or interpolated.
pub const RESERVED_FIELDS: [&str; 4] = [ID, SOURCE, MEASUREMENT_TIME, CONSOLIDATION_LEVEL];

/// `true` for the four reserved diagram fields.
pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// A single field value.
///
/// Serialized adjacently tagged (`{"type": "float", "value": 1.5}`);
/// timestamps are stored as Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// UTC instant with whole-second resolution.
    Timestamp(#[serde(with = "chrono::serde::ts_seconds")] DateTime<Utc>),
    /// Free text.
    Text(String),
    /// Missing value.
    Null,
}

impl Value {
    /// Numeric view used by averaging and interpolation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    /// Timestamp view. Integers are read as Unix seconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Integer(secs) => DateTime::from_timestamp(*secs, 0),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<ConsolidationLevel> for Value {
    fn from(v: ConsolidationLevel) -> Self {
        Value::Integer(i64::from(v.code()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Ordered field map of a record.
pub type Fields = IndexMap<String, Value>;

/// A record with generic named-field access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    id: Option<i64>,
    fields: Fields,
}

impl Record {
    /// A new, not yet persisted, record without fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record loaded from storage.
    pub fn with_id(id: i64, fields: Fields) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }

    /// A not yet persisted record from `(name, value)` pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            id: None,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Storage id, `None` until the record has been committed.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Set by stores when a record is first persisted.
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// Read a field. `"id"` reads the storage id.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == ID {
            return self.id.map(Value::Integer);
        }
        self.fields.get(name).cloned()
    }

    /// Borrow a non-id field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Write a field. The storage id cannot be set through this accessor.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        if name == ID {
            return;
        }
        self.fields.insert(name.to_string(), value.into());
    }

    /// All non-id fields in insertion order.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Measurement fields: every field that is not reserved.
    pub fn measurement_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Timestamp stored under `name`, if any.
    pub fn time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.fields.get(name).and_then(Value::as_timestamp)
    }

    /// The diagram measurement time.
    pub fn measurement_time(&self) -> Option<DateTime<Utc>> {
        self.time(MEASUREMENT_TIME)
    }

    /// The diagram provenance.
    pub fn source(&self) -> Option<&str> {
        self.fields.get(SOURCE).and_then(Value::as_str)
    }

    /// The diagram consolidation level.
    pub fn consolidation_level(&self) -> Option<ConsolidationLevel> {
        match self.fields.get(CONSOLIDATION_LEVEL)? {
            Value::Integer(code) => ConsolidationLevel::from_code(*code).ok(),
            _ => None,
        }
    }

    /// Stamp the reserved diagram fields in one go.
    pub fn stamp(&mut self, source: &str, level: ConsolidationLevel, measurement_time: DateTime<Utc>) {
        self.set(SOURCE, source);
        self.set(CONSOLIDATION_LEVEL, level);
        self.set(MEASUREMENT_TIME, measurement_time);
    }
}
