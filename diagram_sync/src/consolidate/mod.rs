//! The consolidation engine.
//!
//! ## Stages
//! - [`translate`]: copy new source records into RAW diagram records.
//! - [`downsample`]: average a finer level into centered buckets of a coarser
//!   level (MINUTE → HOUR → DAY → MONTH, in that order).
//! - [`upsample`]: linearly interpolate RAW samples onto the MINUTE grid.
//!
//! ## Incremental runs
//! Resampling stages read their [`ConsolidationCursor`](crate::mapping::ConsolidationCursor)
//! first and only advance it after the data batch committed. A crash between
//! the two commits makes the next run recompute (and harmlessly re-upsert) the
//! last interval. Target records are looked up by (source, level, time) and
//! overwritten, so overlapping runs never duplicate them.
//!
//! ## Failures inside an upsert loop
//! Whatever was staged before the error is committed, then the error is
//! returned and the cursor stays where it was.

pub mod downsample;
pub mod translate;
pub mod upsample;

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::level::ConsolidationLevel;
use crate::mapping::Mapping;
use crate::record::{CONSOLIDATION_LEVEL, MEASUREMENT_TIME, Record, SOURCE};
use crate::store::{CursorStore, Query, RecordStore};

pub use downsample::{downsample, downsample_all};
pub use translate::translate;
pub use upsample::{linear_interpolate, upsample};

#[derive(thiserror::Error, Debug)]
/// Errors raised by the consolidation engine and its callers.
pub enum ConsolidationError {
    #[error("invalid argument: {0}")]
    /// Bad caller input (e.g. a CLI argument); nothing was attempted.
    Validation(String),
    #[error("mapping {mapping_id} has no consolidation cursor for level {level}")]
    /// The mapping was built without a cursor for a resampled level.
    MissingCursor {
        /// Mapping without the cursor.
        mapping_id: i64,
        /// Level whose cursor is missing.
        level: ConsolidationLevel,
    },
    #[error("mapping {mapping_id} maps no source field to measurement_time")]
    /// No field mapping targets the diagram measurement time.
    MissingTimeMapping {
        /// Misconfigured mapping.
        mapping_id: i64,
    },
    #[error("level {0} is not produced by resampling")]
    /// RAW (or an upsampling-only level) was requested as a downsampling target.
    NotResampleable(ConsolidationLevel),
    #[error("interpolation target {target} lies outside [{start}, {end}]")]
    /// A generated timestamp is not bracketed by two source samples.
    OutsideBracket {
        /// Generated timestamp.
        target: DateTime<Utc>,
        /// Earliest available sample.
        start: DateTime<Utc>,
        /// Latest available sample.
        end: DateTime<Utc>,
    },
    #[error("{record_type} record {record_id:?} has no usable timestamp in field {field}")]
    /// A record's time field is missing or not a timestamp.
    InvalidTime {
        /// Collection of the offending record.
        record_type: String,
        /// Storage id of the offending record.
        record_id: Option<i64>,
        /// Field that should hold the time.
        field: String,
    },
    #[error("unknown mapping id {0}")]
    /// No mapping with this id exists.
    UnknownMapping(i64),
    #[error("no mappings for diagram type {diagram_type}{}", data_source_suffix(.source_type))]
    /// No mapping matches the requested diagram (and data source).
    NoMatchingMappings {
        /// Requested diagram type.
        diagram_type: String,
        /// Requested data source, if any.
        source_type: Option<String>,
    },
}

fn data_source_suffix(source_type: &Option<String>) -> String {
    source_type
        .as_deref()
        .map(|s| format!(" and data source {s}"))
        .unwrap_or_default()
}

/// Outcome of one [`translate`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateReport {
    /// Newest RAW measurement time that existed before the run.
    pub last_known_measurement_time: Option<DateTime<Utc>>,
    /// Number of diagram records created.
    pub translated: usize,
}

impl fmt::Display for TranslateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_known_measurement_time {
            Some(t) => write!(
                f,
                "translated {} (last known {})",
                self.translated,
                crate::tz::to_rfc3339_millis(t)
            ),
            None => write!(f, "translated {} (last known none)", self.translated),
        }
    }
}

/// Outcome of one [`downsample`] or [`upsample`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleReport {
    /// Source records taken into account, boundary records included.
    pub read: usize,
    /// Target records written or overwritten.
    pub generated: usize,
}

impl fmt::Display for ResampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read {}, generated {}", self.read, self.generated)
    }
}

/// One-line summary of a translation run, as printed by the CLI.
pub fn translate_summary(mapping_id: i64, report: &TranslateReport) -> String {
    format!("mapping {mapping_id}: {report}")
}

/// One-line summary of a resampling run, as printed by the CLI.
pub fn resample_summary(mapping_id: i64, level: ConsolidationLevel, report: &ResampleReport) -> String {
    format!("mapping {mapping_id} level {level}: {report}")
}

/// Records of one provenance and level in the mapping's diagram collection.
pub(crate) fn level_query(mapping: &Mapping, level: ConsolidationLevel) -> Query {
    Query::new()
        .eq(SOURCE, mapping.source_type.as_str())
        .eq(CONSOLIDATION_LEVEL, level)
}

/// Measurement time of a diagram record, or an [`ConsolidationError::InvalidTime`].
pub(crate) fn measurement_time_of(mapping: &Mapping, record: &Record) -> anyhow::Result<DateTime<Utc>> {
    record.measurement_time().ok_or_else(|| {
        ConsolidationError::InvalidTime {
            record_type: mapping.diagram_type.clone(),
            record_id: record.id(),
            field: MEASUREMENT_TIME.to_string(),
        }
        .into()
    })
}

/// The existing target record at exactly `time`, or a fresh one.
pub(crate) fn find_or_create<S: RecordStore>(
    store: &mut S,
    mapping: &Mapping,
    level: ConsolidationLevel,
    time: DateTime<Utc>,
) -> anyhow::Result<Record> {
    let query = level_query(mapping, level).eq(MEASUREMENT_TIME, time);
    Ok(store
        .query_one(&mapping.diagram_type, &query)?
        .unwrap_or_default())
}

/// Commit what is already staged when `result` is an error, then return it.
pub(crate) fn flush_on_error<S: RecordStore, T>(store: &mut S, result: anyhow::Result<T>) -> anyhow::Result<T> {
    let err = match result {
        Ok(v) => return Ok(v),
        Err(err) => err,
    };
    let staged = store.pending();
    match store.commit() {
        Ok(written) => warn!(staged, written, error = %err, "flushed partial batch before failing"),
        Err(commit_err) => warn!(staged, error = %err, %commit_err, "could not flush partial batch"),
    }
    Err(err)
}

/// Current watermark for `level`; a missing cursor is a configuration error.
pub(crate) fn watermark(mapping: &Mapping, level: ConsolidationLevel) -> anyhow::Result<Option<DateTime<Utc>>> {
    mapping
        .cursor(level)
        .map(|c| c.last_measurement_time)
        .ok_or_else(|| {
            ConsolidationError::MissingCursor {
                mapping_id: mapping.id,
                level,
            }
            .into()
        })
}

/// Persist the new watermark, then mirror it on the in-memory mapping.
pub(crate) fn advance_cursor<S: CursorStore>(
    store: &mut S,
    mapping: &mut Mapping,
    level: ConsolidationLevel,
    to: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mapping_id = mapping.id;
    let cursor = mapping
        .cursor_mut(level)
        .ok_or(ConsolidationError::MissingCursor { mapping_id, level })?;
    let mut updated = cursor.clone();
    updated.last_measurement_time = Some(to);
    store.save_cursor(&updated)?;
    *cursor = updated;
    Ok(())
}
