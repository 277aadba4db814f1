//! Time zone parsing and formatting helpers.
//!
//! - [`to_rfc3339_millis`] / [`parse_ts_to_utc`]: the on-disk watermark format
//!   (RFC-3339 UTC with millisecond precision) and its inverse.
//! - [`parse_cli_time`]: accepts either an RFC-3339 timestamp with offset or a
//!   naive local timestamp plus an IANA zone (e.g. "Europe/Berlin"), resolving
//!   DST gaps and ambiguities with a [`DstPolicy`].
//!
//! All stored times and all interval math are UTC; local times only appear at
//! the CLI edge.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Policy for local times that fall into a DST gap or occur twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    Strict,
    /// Ambiguous: take the earlier instant. Nonexistent: shift forward to the
    /// first valid minute (capped at 2 hours).
    Lenient,
}

/// Convert a naive local timestamp in `zone` to UTC.
pub fn local_to_utc(naive: NaiveDateTime, zone: Tz, policy: DstPolicy) -> anyhow::Result<DateTime<Utc>> {
    use chrono::offset::LocalResult::*;
    match zone.from_local_datetime(&naive) {
        Single(dt) => Ok(dt.with_timezone(&Utc)),
        Ambiguous(earliest, _) if policy == DstPolicy::Lenient => Ok(earliest.with_timezone(&Utc)),
        Ambiguous(..) => Err(anyhow!("ambiguous local time {naive} in {zone}")),
        None if policy == DstPolicy::Lenient => {
            let mut t = naive;
            for _ in 0..120 {
                t += chrono::Duration::minutes(1);
                if let Single(dt) = zone.from_local_datetime(&t) {
                    return Ok(dt.with_timezone(&Utc));
                }
            }
            Err(anyhow!("nonexistent local time {naive} in {zone}"))
        }
        None => Err(anyhow!("nonexistent local time {naive} in {zone}")),
    }
}

/// Parse a timestamp given on the command line.
///
/// RFC-3339 input carries its own offset and ignores `zone`. Naive input
/// (`YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`) is read in `zone`, UTC when
/// no zone is given.
pub fn parse_cli_time(s: &str, zone: Option<&str>, policy: DstPolicy) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("bad timestamp: {s}"))?;
    match zone {
        None => Ok(naive.and_utc()),
        Some(name) => {
            let zone: Tz = name.parse().map_err(|_| anyhow!("bad tz: {name}"))?;
            local_to_utc(naive, zone, policy)
        }
    }
}
