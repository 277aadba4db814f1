//! Consolidation levels: the sampling granularities a diagram is kept at.
//!
//! A [`ConsolidationLevel`] is one of RAW, MINUTE, HOUR, DAY or MONTH, totally
//! ordered from finest to coarsest. Every level except RAW has a fixed nominal
//! [`Interval`] length, and every level except RAW is produced from the next
//! finer one (see [`ConsolidationLevel::source_level`]).
//!
//! Typical usage:
//! ```
//! use diagram_sync::level::ConsolidationLevel;
//!
//! let hour = ConsolidationLevel::Hour;
//! assert_eq!(hour.source_level(), Some(ConsolidationLevel::Minute));
//! assert_eq!(hour.interval().map(|i| i.seconds()), Some(3600));
//! assert_eq!("day".parse::<ConsolidationLevel>().unwrap(), ConsolidationLevel::Day);
//! ```

use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, SECS_PER_DAY, SECS_PER_HOUR, SECS_PER_MINUTE, SECS_PER_MONTH};

/// Sampling granularity of a diagram record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationLevel {
    /// Records copied 1:1 from a source.
    Raw = 0,
    /// One record per minute.
    Minute = 1,
    /// One record per hour.
    Hour = 2,
    /// One record per day.
    Day = 3,
    /// One record per (average) month.
    Month = 4,
}

impl ConsolidationLevel {
    /// All levels, finest first.
    pub const ALL: [ConsolidationLevel; 5] = [
        ConsolidationLevel::Raw,
        ConsolidationLevel::Minute,
        ConsolidationLevel::Hour,
        ConsolidationLevel::Day,
        ConsolidationLevel::Month,
    ];

    /// Levels that own a consolidation cursor (everything but RAW).
    pub const RESAMPLED: [ConsolidationLevel; 4] = [
        ConsolidationLevel::Minute,
        ConsolidationLevel::Hour,
        ConsolidationLevel::Day,
        ConsolidationLevel::Month,
    ];

    /// Levels produced by averaging, in the order they must run.
    pub const DOWNSAMPLED: [ConsolidationLevel; 3] = [
        ConsolidationLevel::Hour,
        ConsolidationLevel::Day,
        ConsolidationLevel::Month,
    ];

    /// Fixed interval length, `None` for RAW.
    pub const fn interval(self) -> Option<Interval> {
        match self {
            ConsolidationLevel::Raw => None,
            ConsolidationLevel::Minute => Some(Interval::from_seconds(SECS_PER_MINUTE)),
            ConsolidationLevel::Hour => Some(Interval::from_seconds(SECS_PER_HOUR)),
            ConsolidationLevel::Day => Some(Interval::from_seconds(SECS_PER_DAY)),
            ConsolidationLevel::Month => Some(Interval::from_seconds(SECS_PER_MONTH)),
        }
    }

    /// The next finer level this one is computed from, `None` for RAW.
    pub const fn source_level(self) -> Option<ConsolidationLevel> {
        match self {
            ConsolidationLevel::Raw => None,
            ConsolidationLevel::Minute => Some(ConsolidationLevel::Raw),
            ConsolidationLevel::Hour => Some(ConsolidationLevel::Minute),
            ConsolidationLevel::Day => Some(ConsolidationLevel::Hour),
            ConsolidationLevel::Month => Some(ConsolidationLevel::Day),
        }
    }

    /// Integer code used in storage and on the command line.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`ConsolidationLevel::code`].
    pub fn from_code(code: i64) -> anyhow::Result<Self> {
        match code {
            0 => Ok(ConsolidationLevel::Raw),
            1 => Ok(ConsolidationLevel::Minute),
            2 => Ok(ConsolidationLevel::Hour),
            3 => Ok(ConsolidationLevel::Day),
            4 => Ok(ConsolidationLevel::Month),
            _ => bail!("unknown consolidation level code: {code}"),
        }
    }

    /// Lowercase name (`"raw"`, `"minute"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            ConsolidationLevel::Raw => "raw",
            ConsolidationLevel::Minute => "minute",
            ConsolidationLevel::Hour => "hour",
            ConsolidationLevel::Day => "day",
            ConsolidationLevel::Month => "month",
        }
    }
}

impl fmt::Display for ConsolidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the name (`"hour"`) or the integer code (`"2"`).
impl FromStr for ConsolidationLevel {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code);
        }
        match s.to_lowercase().as_str() {
            "raw" => Ok(ConsolidationLevel::Raw),
            "minute" => Ok(ConsolidationLevel::Minute),
            "hour" => Ok(ConsolidationLevel::Hour),
            "day" => Ok(ConsolidationLevel::Day),
            "month" => Ok(ConsolidationLevel::Month),
            _ => bail!("unknown consolidation level: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_finest_first() {
        let mut sorted = ConsolidationLevel::ALL;
        sorted.sort();
        assert_eq!(sorted, ConsolidationLevel::ALL);
        assert!(ConsolidationLevel::Raw < ConsolidationLevel::Month);
    }

    #[test]
    fn source_level_walks_one_step_finer() {
        assert_eq!(ConsolidationLevel::Raw.source_level(), None);
        for pair in ConsolidationLevel::ALL.windows(2) {
            assert_eq!(pair[1].source_level(), Some(pair[0]));
        }
    }

    #[test]
    fn interval_lengths() {
        let secs: Vec<Option<i64>> = ConsolidationLevel::ALL
            .iter()
            .map(|l| l.interval().map(|i| i.seconds()))
            .collect();
        assert_eq!(
            secs,
            vec![None, Some(60), Some(3600), Some(86_400), Some(2_629_800)]
        );
    }

    #[test]
    fn code_and_name_roundtrip() {
        for level in ConsolidationLevel::ALL {
            assert_eq!(ConsolidationLevel::from_code(level.code() as i64).unwrap(), level);
            assert_eq!(level.name().parse::<ConsolidationLevel>().unwrap(), level);
            assert_eq!(level.code().to_string().parse::<ConsolidationLevel>().unwrap(), level);
        }
        assert!(ConsolidationLevel::from_code(5).is_err());
        assert!("weekly".parse::<ConsolidationLevel>().is_err());
    }
}
