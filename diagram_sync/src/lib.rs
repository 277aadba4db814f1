//! Incremental time-series consolidation.
//!
//! Source records are translated into RAW diagram records, interpolated onto
//! a MINUTE grid and averaged into HOUR, DAY and MONTH buckets. Every
//! resampled level keeps a per-mapping watermark so runs are incremental and
//! re-runs are idempotent.
//!
//! Entry points:
//! - [`consolidate`]: the engine ([`consolidate::translate`],
//!   [`consolidate::downsample`], [`consolidate::upsample`]).
//! - [`store`]: the record store interface with memory and SQLite backends.
//! - [`mapping`]: mappings, their SQLite repository and the TOML catalog sync.
//! - [`db`]: connections and embedded migrations.

#![deny(missing_docs)]

pub mod consolidate;
pub mod db;
pub mod generator;
pub mod interval;
pub mod level;
pub mod lock;
pub mod mapping;
pub mod models;
pub mod record;
/// Diesel table definitions matching the embedded migrations.
#[allow(missing_docs)]
pub mod schema;
pub mod store;
pub mod tz;
