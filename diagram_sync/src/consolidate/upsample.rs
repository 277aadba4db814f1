//! Upsampling: linear interpolation of RAW samples onto the MINUTE grid.
//!
//! Generated timestamps are whole minutes strictly after
//! `max(first sample, cursor)` and strictly before the last sample, so every
//! point is bracketed by two samples and a re-run without new samples
//! generates nothing.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::consolidate::{
    ConsolidationError, ResampleReport, advance_cursor, find_or_create, flush_on_error, level_query,
    measurement_time_of, watermark,
};
use crate::interval::{Interval, next_boundary, round_to_interval};
use crate::level::ConsolidationLevel;
use crate::mapping::Mapping;
use crate::record::{MEASUREMENT_TIME, Record};
use crate::store::{CursorStore, Order, RecordStore};

/// `y0 + (t − t0) × (y1 − y0) / (t1 − t0)`; returns `y0` when `t0 == t1`.
pub fn linear_interpolate(t: i64, t0: i64, y0: f64, t1: i64, y1: f64) -> f64 {
    if t1 == t0 {
        return y0;
    }
    y0 + (t - t0) as f64 * (y1 - y0) / (t1 - t0) as f64
}

/// A RAW sample with its parsed measurement time.
struct Sample {
    time: DateTime<Utc>,
    record: Record,
}

/// Interpolate MINUTE records for `mapping` from its RAW records, reading at
/// most `limit` new samples and generating at most `limit` points (`0` means
/// unbounded).
pub fn upsample<S>(store: &mut S, mapping: &mut Mapping, limit: usize) -> anyhow::Result<ResampleReport>
where
    S: RecordStore + CursorStore,
{
    let target = ConsolidationLevel::Minute;
    let (Some(source_level), Some(interval)) = (target.source_level(), target.interval()) else {
        return Err(ConsolidationError::NotResampleable(target).into());
    };
    let last = watermark(mapping, target)?;
    let diagram = mapping.diagram_type.clone();

    let fresh_query = level_query(mapping, source_level)
        .gt_opt(MEASUREMENT_TIME, last)
        .order_by(MEASUREMENT_TIME, Order::Asc)
        .limit(limit);
    let mut records = Vec::new();
    // left endpoint for the first generated point
    if let Some(l) = last {
        let anchor_query = level_query(mapping, source_level)
            .le(MEASUREMENT_TIME, l)
            .order_by(MEASUREMENT_TIME, Order::Desc);
        records.extend(store.query_one(&diagram, &anchor_query)?);
    }
    records.extend(store.query(&diagram, &fresh_query)?);

    let read = records.len();
    if read < 2 {
        debug!(mapping_id = mapping.id, read, "not enough samples to interpolate");
        return Ok(ResampleReport { read, generated: 0 });
    }

    let samples = records
        .into_iter()
        .map(|record| {
            let time = measurement_time_of(mapping, &record)?;
            Ok(Sample { time, record })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (first_time, last_time) = (samples[0].time, samples[read - 1].time);
    let targets = grid(interval, first_time.max(last.unwrap_or(first_time)), last_time, limit);
    if targets.is_empty() {
        debug!(mapping_id = mapping.id, read, "no new minute inside the sampled range");
        return Ok(ResampleReport { read, generated: 0 });
    }

    let staged = stage_points(store, mapping, &samples, &targets);
    let generated = flush_on_error(store, staged)?;
    store.commit()?;

    let newest = targets[targets.len() - 1];
    advance_cursor(store, mapping, target, newest)?;

    info!(
        mapping_id = mapping.id,
        level = %target,
        read,
        generated,
        cursor = %newest,
        "upsampled"
    );
    Ok(ResampleReport { read, generated })
}

/// Whole-interval timestamps in `(after, before)`, at most `limit` of them.
fn grid(interval: Interval, after: DateTime<Utc>, before: DateTime<Utc>, limit: usize) -> Vec<DateTime<Utc>> {
    let earliest = after + Duration::seconds(1);
    let mut t = round_to_interval(interval, &earliest);
    if t < earliest {
        t = next_boundary(interval, &t);
    }
    let mut out = Vec::new();
    while t < before && (limit == 0 || out.len() < limit) {
        out.push(t);
        t = next_boundary(interval, &t);
    }
    out
}

fn stage_points<S: RecordStore>(
    store: &mut S,
    mapping: &Mapping,
    samples: &[Sample],
    targets: &[DateTime<Utc>],
) -> anyhow::Result<usize> {
    let target_level = ConsolidationLevel::Minute;
    let mut staged = 0;
    for &t in targets {
        // samples[..idx] are at or before t
        let idx = samples.partition_point(|s| s.time <= t);
        if idx == 0 || idx == samples.len() {
            return Err(ConsolidationError::OutsideBracket {
                target: t,
                start: samples[0].time,
                end: samples[samples.len() - 1].time,
            }
            .into());
        }
        let (left, right) = (&samples[idx - 1], &samples[idx]);

        let mut record = find_or_create(store, mapping, target_level, t)?;
        for (name, v0) in left.record.measurement_fields() {
            let (Some(y0), Some(y1)) = (v0.as_f64(), right.record.field(name).and_then(|v| v.as_f64())) else {
                continue;
            };
            let y = linear_interpolate(t.timestamp(), left.time.timestamp(), y0, right.time.timestamp(), y1);
            record.set(name, y);
        }
        record.stamp(&mapping.source_type, target_level, t);
        debug!(mapping_id = mapping.id, %t, left = %left.time, right = %right.time, "staging interpolated point");
        store.stage(&mapping.diagram_type, record);
        staged += 1;
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    fn minute() -> Interval {
        Interval::from_seconds(60)
    }

    #[test]
    fn interpolation_hits_endpoints_and_midpoint() {
        assert_eq!(linear_interpolate(0, 0, 3.0, 600, 9.0), 3.0);
        assert_eq!(linear_interpolate(600, 0, 3.0, 600, 9.0), 9.0);
        assert_eq!(linear_interpolate(300, 0, 3.0, 600, 9.0), 6.0);
        assert_eq!(linear_interpolate(5, 5, 1.0, 5, 2.0), 1.0);
    }

    #[test]
    fn grid_is_open_on_both_ends() {
        let g = grid(minute(), at(10, 0, 0), at(10, 10, 0), 0);
        assert_eq!(g.len(), 9);
        assert_eq!(g[0], at(10, 1, 0));
        assert_eq!(g[8], at(10, 9, 0));
    }

    #[test]
    fn grid_never_starts_before_its_lower_bound() {
        // 10:00:20 rounds down to 10:00, so the first point is 10:01
        assert_eq!(grid(minute(), at(10, 0, 20), at(10, 3, 0), 0), vec![at(10, 1, 0), at(10, 2, 0)]);
        // 10:00:40 rounds up to 10:01
        assert_eq!(grid(minute(), at(10, 0, 40), at(10, 3, 0), 0), vec![at(10, 1, 0), at(10, 2, 0)]);
    }

    #[test]
    fn grid_respects_limit() {
        assert_eq!(grid(minute(), at(10, 0, 0), at(11, 0, 0), 3).len(), 3);
        assert!(grid(minute(), at(10, 0, 0), at(10, 0, 30), 0).is_empty());
    }
}
