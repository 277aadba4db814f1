//! Downsampling: average a finer level into centered buckets of a coarser one.
//!
//! One run:
//! 1. read the cursor of the target level,
//! 2. fetch up to `limit` source-level records newer than the cursor,
//! 3. group them by [`round_to_interval`] of the target interval,
//! 4. re-fetch the already processed head of the first bucket and, when the
//!    batch was limited, the not yet fetched tail of the last bucket,
//! 5. average every numeric measurement field per bucket and upsert one
//!    target record per bucket,
//! 6. commit, then move the cursor to the newest record seen.
//!
//! The boundary re-fetches are not capped; a bucket holding very many source
//! records is read in full.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use roaring::RoaringTreemap;
use tracing::{debug, info};

use crate::consolidate::{
    ConsolidationError, ResampleReport, advance_cursor, find_or_create, flush_on_error, level_query,
    measurement_time_of, watermark,
};
use crate::interval::{IntervalBounds, interval_bounds, round_to_interval};
use crate::level::ConsolidationLevel;
use crate::mapping::Mapping;
use crate::record::{MEASUREMENT_TIME, Record};
use crate::store::{CursorStore, Order, RecordStore};

/// Source records that fall into one target interval.
#[derive(Debug)]
struct Bucket {
    label: DateTime<Utc>,
    bounds: IntervalBounds<Utc>,
    records: Vec<(DateTime<Utc>, Record)>,
    seen: RoaringTreemap,
}

impl Bucket {
    fn new(label: DateTime<Utc>, bounds: IntervalBounds<Utc>) -> Self {
        Self {
            label,
            bounds,
            records: Vec::new(),
            seen: RoaringTreemap::new(),
        }
    }

    /// Add a record unless a record with the same id is already in the bucket.
    fn push(&mut self, time: DateTime<Utc>, record: Record) -> bool {
        if let Some(id) = record.id().and_then(|id| u64::try_from(id).ok()) {
            if !self.seen.insert(id) {
                return false;
            }
        }
        self.records.push((time, record));
        true
    }

    /// Keep entries ascending by time; ties keep insertion order.
    fn sort(&mut self) {
        self.records.sort_by_key(|(t, _)| *t);
    }

    fn last_time(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|(t, _)| *t)
    }

    /// Arithmetic mean of every numeric measurement field.
    fn averages(&self) -> IndexMap<String, f64> {
        let mut sums: IndexMap<&str, (f64, usize)> = IndexMap::new();
        for (_, record) in &self.records {
            for (name, value) in record.measurement_fields() {
                if let Some(x) = value.as_f64() {
                    let entry = sums.entry(name).or_insert((0.0, 0));
                    entry.0 += x;
                    entry.1 += 1;
                }
            }
        }
        sums.into_iter()
            .map(|(name, (sum, n))| (name.to_string(), sum / n as f64))
            .collect()
    }
}

/// Downsample `mapping` into `target` (HOUR, DAY or MONTH), reading at most
/// `limit` new source records (`0` means unbounded).
pub fn downsample<S>(
    store: &mut S,
    mapping: &mut Mapping,
    target: ConsolidationLevel,
    limit: usize,
) -> anyhow::Result<ResampleReport>
where
    S: RecordStore + CursorStore,
{
    let (source_level, interval) = match (target.source_level(), target.interval()) {
        (Some(source), Some(interval)) if target != ConsolidationLevel::Minute => (source, interval),
        _ => return Err(ConsolidationError::NotResampleable(target).into()),
    };
    let last = watermark(mapping, target)?;
    let diagram = mapping.diagram_type.clone();

    let fresh_query = level_query(mapping, source_level)
        .gt_opt(MEASUREMENT_TIME, last)
        .order_by(MEASUREMENT_TIME, Order::Asc)
        .limit(limit);
    let fresh = store.query(&diagram, &fresh_query)?;
    if fresh.is_empty() {
        debug!(mapping_id = mapping.id, level = %target, "nothing to downsample");
        return Ok(ResampleReport::default());
    }

    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    let place = |buckets: &mut BTreeMap<i64, Bucket>, time: DateTime<Utc>, record: Record| {
        let label = round_to_interval(interval, &time);
        buckets
            .entry(label.timestamp())
            .or_insert_with(|| Bucket::new(label, interval_bounds(interval, &label)))
            .push(time, record)
    };

    let mut first_time = None;
    let mut last_time = None;
    for record in fresh {
        let time = measurement_time_of(mapping, &record)?;
        first_time.get_or_insert(time);
        last_time = Some(time);
        place(&mut buckets, time, record);
    }
    let (Some(first_time), Some(last_time)) = (first_time, last_time) else {
        return Ok(ResampleReport::default());
    };

    // head of the first bucket, consumed by an earlier run
    if let Some(first) = buckets.values_mut().next() {
        let head_query = level_query(mapping, source_level)
            .ge(MEASUREMENT_TIME, first.bounds.start)
            .lt(MEASUREMENT_TIME, first_time)
            .order_by(MEASUREMENT_TIME, Order::Asc);
        for record in store.query(&diagram, &head_query)? {
            let time = measurement_time_of(mapping, &record)?;
            first.push(time, record);
        }
        first.sort();
    }

    // tail of the last bucket, cut off by the limit
    if limit > 0 {
        if let Some(last_bucket) = buckets.values_mut().next_back() {
            let tail_query = level_query(mapping, source_level)
                .gt(MEASUREMENT_TIME, last_time)
                .le(MEASUREMENT_TIME, last_bucket.bounds.end)
                .order_by(MEASUREMENT_TIME, Order::Asc);
            for record in store.query(&diagram, &tail_query)? {
                let time = measurement_time_of(mapping, &record)?;
                last_bucket.push(time, record);
            }
            last_bucket.sort();
        }
    }

    let read = buckets.values().map(|b| b.records.len()).sum();
    let newest = buckets
        .values()
        .next_back()
        .and_then(Bucket::last_time)
        .unwrap_or(last_time);

    let staged = stage_buckets(store, mapping, target, &buckets);
    let generated = flush_on_error(store, staged)?;
    store.commit()?;

    advance_cursor(store, mapping, target, newest)?;

    info!(
        mapping_id = mapping.id,
        level = %target,
        read,
        generated,
        cursor = %newest,
        "downsampled"
    );
    Ok(ResampleReport { read, generated })
}

fn stage_buckets<S: RecordStore>(
    store: &mut S,
    mapping: &Mapping,
    target: ConsolidationLevel,
    buckets: &BTreeMap<i64, Bucket>,
) -> anyhow::Result<usize> {
    let mut staged = 0;
    for bucket in buckets.values() {
        let mut record = find_or_create(store, mapping, target, bucket.label)?;
        for (name, mean) in bucket.averages() {
            record.set(&name, mean);
        }
        record.stamp(&mapping.source_type, target, bucket.label);
        debug!(
            mapping_id = mapping.id,
            level = %target,
            label = %bucket.label,
            records = bucket.records.len(),
            update = record.id().is_some(),
            "staging bucket"
        );
        store.stage(&mapping.diagram_type, record);
        staged += 1;
    }
    Ok(staged)
}

/// Run HOUR, DAY and MONTH in that order, each consuming the previous level.
pub fn downsample_all<S>(
    store: &mut S,
    mapping: &mut Mapping,
    limit: usize,
) -> anyhow::Result<Vec<(ConsolidationLevel, ResampleReport)>>
where
    S: RecordStore + CursorStore,
{
    ConsolidationLevel::DOWNSAMPLED
        .iter()
        .map(|&level| downsample(store, mapping, level, limit).map(|report| (level, report)))
        .collect()
}
