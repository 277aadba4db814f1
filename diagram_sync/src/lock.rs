//! Advisory job lock.
//!
//! One lease row per job kind in `job_lock`. A second process finding a live
//! lease backs off; a lease past its `expires_at` belongs to a crashed run and
//! is taken over. Times are RFC-3339 UTC with millisecond precision, which
//! sort lexicographically.

use std::fmt;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use tracing::{debug, warn};

use crate::models::JobLockRow;
use crate::schema::job_lock::dsl as jl;
use crate::tz;

/// Scheduled jobs that must not overlap with themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Source → RAW translation.
    Translate,
    /// HOUR/DAY/MONTH downsampling.
    Downsample,
    /// MINUTE interpolation.
    Interpolate,
}

impl JobKind {
    /// Lock row name.
    pub const fn name(self) -> &'static str {
        match self {
            JobKind::Translate => "translate",
            JobKind::Downsample => "downsample",
            JobKind::Interpolate => "interpolate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    /// Locked job.
    pub job: JobKind,
    /// Unique owner token of this holder.
    pub owner: String,
    /// When other processes may take the lock over.
    pub expires_at: String,
}

fn owner_token() -> String {
    format!("pid{}-{:016x}", std::process::id(), rand::random::<u64>())
}

/// Try to take the lock for `job`; `None` if another live holder has it.
pub fn try_acquire(conn: &mut SqliteConnection, job: JobKind, ttl: Duration) -> anyhow::Result<Option<JobLease>> {
    let now = Utc::now();
    let now_s = tz::to_rfc3339_millis(now);
    let row = JobLockRow {
        name: job.name().to_string(),
        owner: owner_token(),
        acquired_at: now_s.clone(),
        expires_at: tz::to_rfc3339_millis(now + ttl),
    };

    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let reclaimed = diesel::delete(jl::job_lock.filter(jl::name.eq(job.name()).and(jl::expires_at.le(now_s.as_str()))))
            .execute(conn)?;
        if reclaimed > 0 {
            warn!(job = %job, "took over an expired job lock");
        }

        let inserted = diesel::insert_into(jl::job_lock)
            .values(&row)
            .on_conflict(jl::name)
            .do_nothing()
            .execute(conn)?;
        if inserted == 0 {
            debug!(job = %job, "job lock is held by another instance");
            return Ok(None);
        }
        debug!(job = %job, owner = %row.owner, expires_at = %row.expires_at, "acquired job lock");
        Ok(Some(JobLease {
            job,
            owner: row.owner.clone(),
            expires_at: row.expires_at.clone(),
        }))
    })
}

/// Release a lease. Returns `false` if it had already been taken over.
pub fn release(conn: &mut SqliteConnection, lease: &JobLease) -> anyhow::Result<bool> {
    let n = diesel::delete(
        jl::job_lock.filter(
            jl::name
                .eq(lease.job.name())
                .and(jl::owner.eq(lease.owner.as_str())),
        ),
    )
    .execute(conn)?;
    Ok(n > 0)
}
