//! Centered interval math for consolidation buckets
//!
//! - One stable epoch: Unix (1970-01-01T00:00:00Z); all math is in whole seconds.
//! - A timestamp is assigned to the interval boundary *nearest* to it
//!   ([`round_to_interval`], half away from zero).
//! - The bucket of a boundary is centered on it: it starts half an interval
//!   before and ends one second before the next bucket starts
//!   ([`interval_bounds`]).
//! - Month is the average month (365.25 / 12 days), not a calendar month.
//!
//! Results keep the time zone of the input timestamp; sub-second parts are
//! dropped.

use chrono::{DateTime, Duration, TimeZone};

/// Number of seconds in a minute.
pub const SECS_PER_MINUTE: i64 = 60;
/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
/// Average month length in seconds: 365.25 / 12 days.
pub const SECS_PER_MONTH: i64 = 36_525 * SECS_PER_DAY / 1_200;

/// A fixed interval length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    secs: i64,
}

impl Interval {
    /// Interval of `secs` seconds. Callers pass positive lengths.
    pub const fn from_seconds(secs: i64) -> Self {
        Self { secs }
    }

    /// Length in seconds.
    pub const fn seconds(self) -> i64 {
        self.secs
    }

    /// Half the interval, rounded down.
    const fn half(self) -> i64 {
        self.secs / 2
    }
}

/// Inclusive start and end of the bucket around a rounded boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalBounds<Tz: TimeZone> {
    /// First second of the bucket.
    pub start: DateTime<Tz>,
    /// Last second of the bucket (one second before the next bucket starts).
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> IntervalBounds<Tz> {
    /// `true` if `t` lies in `[start, end]`.
    pub fn contains<Tz2: TimeZone>(&self, t: &DateTime<Tz2>) -> bool {
        self.start.timestamp() <= t.timestamp() && t.timestamp() <= self.end.timestamp()
    }
}

/// Round `t` to the nearest multiple of `interval` seconds since the epoch.
///
/// Ties round away from zero, so `10:30:00` rounds up to `11:00:00` for an
/// hourly interval.
pub fn round_to_interval<Tz: TimeZone>(interval: Interval, t: &DateTime<Tz>) -> DateTime<Tz> {
    let secs = t.timestamp();
    let len = interval.seconds();
    let quotient = secs.div_euclid(len);
    let remainder = secs.rem_euclid(len);
    // div_euclid floors; decide whether to step up to the next boundary
    let round_up = if secs >= 0 {
        2 * remainder >= len
    } else {
        2 * remainder > len
    };
    let rounded = (quotient + i64::from(round_up)) * len;
    shift_whole_seconds(t, rounded - secs)
}

/// Bucket bounds for a timestamp already produced by [`round_to_interval`].
pub fn interval_bounds<Tz: TimeZone>(interval: Interval, rounded: &DateTime<Tz>) -> IntervalBounds<Tz> {
    let half = interval.half();
    IntervalBounds {
        start: shift_whole_seconds(rounded, -half),
        end: shift_whole_seconds(rounded, half - 1),
    }
}

/// The boundary one interval after `t`.
pub fn next_boundary<Tz: TimeZone>(interval: Interval, t: &DateTime<Tz>) -> DateTime<Tz> {
    t.clone() + Duration::seconds(interval.seconds())
}

/// Move `t` by `delta` seconds and drop its sub-second part.
fn shift_whole_seconds<Tz: TimeZone>(t: &DateTime<Tz>, delta: i64) -> DateTime<Tz> {
    let nanos = i64::from(t.timestamp_subsec_nanos());
    t.clone() - Duration::nanoseconds(nanos) + Duration::seconds(delta)
}

// -------------------- tests --------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::ConsolidationLevel;
    use chrono::{FixedOffset, Timelike, Utc};

    fn hour() -> Interval {
        ConsolidationLevel::Hour.interval().unwrap()
    }

    #[test]
    fn month_is_average_month() {
        assert_eq!(SECS_PER_MONTH, 2_629_800);
        assert_eq!(SECS_PER_MONTH * 12, 36_525 * SECS_PER_DAY / 100);
    }

    #[test]
    fn rounds_to_nearest_boundary() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 29, 59).unwrap();
        assert_eq!(
            round_to_interval(hour(), &t),
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap();
        assert_eq!(
            round_to_interval(hour(), &t),
            Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn ties_round_away_from_zero_before_epoch() {
        let minute = ConsolidationLevel::Minute.interval().unwrap();
        let t = DateTime::from_timestamp(-30, 0).unwrap();
        assert_eq!(round_to_interval(minute, &t).timestamp(), -60);
        let t = DateTime::from_timestamp(-29, 0).unwrap();
        assert_eq!(round_to_interval(minute, &t).timestamp(), 0);
    }

    #[test]
    fn rounding_keeps_time_zone_and_drops_subseconds() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let t = tz
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 40)
            .unwrap()
            .with_nanosecond(250_000_000)
            .unwrap();
        let minute = ConsolidationLevel::Minute.interval().unwrap();
        let r = round_to_interval(minute, &t);
        assert_eq!(r.offset(), t.offset());
        assert_eq!(r, tz.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
        assert_eq!(r.nanosecond(), 0);
    }

    #[test]
    fn bounds_are_centered_on_the_boundary() {
        let rounded = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let b = interval_bounds(hour(), &rounded);
        assert_eq!(b.start, Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap());
        assert_eq!(b.end, Utc.with_ymd_and_hms(2024, 1, 2, 10, 29, 59).unwrap());
        // next bucket starts right after
        let next = interval_bounds(hour(), &next_boundary(hour(), &rounded));
        assert_eq!(next.start, b.end + Duration::seconds(1));
    }

    #[test]
    fn next_boundary_adds_one_interval() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(
            next_boundary(ConsolidationLevel::Day.interval().unwrap(), &t),
            Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap()
        );
    }
}
