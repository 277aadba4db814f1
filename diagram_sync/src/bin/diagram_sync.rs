use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use diesel::SqliteConnection;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use diagram_sync::consolidate::{
    self, ConsolidationError, resample_summary, translate_summary,
};
use diagram_sync::db::{connection::connect_sqlite, migrate};
use diagram_sync::generator::RandomSeriesGenerator;
use diagram_sync::level::ConsolidationLevel;
use diagram_sync::lock::{self, JobKind};
use diagram_sync::mapping::config::load_catalog_path;
use diagram_sync::mapping::repo::SqliteMappingRepo;
use diagram_sync::mapping::sync::{SyncOptions, sync_mappings};
use diagram_sync::mapping::{Mapping, MappingRepo};
use diagram_sync::store::RecordStore;
use diagram_sync::store::sqlite::SqliteStore;
use diagram_sync::tz::{DstPolicy, parse_cli_time};
use shared_utils::env::{get_env_var, parse_env_var_or};

#[derive(Parser)]
#[command(version, about = "Diagram consolidation CLI")]
struct Cli {
    /// SQLite database path or sqlite: URL (default: $DATABASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply embedded migrations.
    Migrate,
    /// Sync mappings from a TOML catalog.
    SyncMappings {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        prune: bool,
    },
    /// Translate new source records of one mapping into RAW diagram records.
    ProcessEntityMapping { mapping_id: i64, limit: usize },
    /// Average finer levels into HOUR, DAY and MONTH records.
    DownsampleDiagram {
        diagram_type: String,
        limit: usize,
        #[arg(long)]
        data_source: Option<String>,
        /// 2 = hour, 3 = day, 4 = month; all three in order when omitted
        #[arg(long, value_parser = parse_downsample_level)]
        consolidation_type: Option<ConsolidationLevel>,
    },
    /// Interpolate RAW records onto the MINUTE grid.
    InterpolateDiagram {
        diagram_type: String,
        limit: usize,
        #[arg(long)]
        data_source: Option<String>,
    },
    /// Write synthetic source records.
    GenerateSeries {
        record_type: String,
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
        /// RFC-3339, or a local time read in --tz
        #[arg(long)]
        start: String,
        #[arg(long)]
        count: usize,
        #[arg(long, default_value_t = 60)]
        step_secs: i64,
        #[arg(long)]
        tz: Option<String>,
        #[arg(long, default_value = "measurement_time")]
        time_field: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 20.0)]
        base: f64,
        #[arg(long, default_value_t = 5.0)]
        amplitude: f64,
        #[arg(long, default_value_t = 86_400.0)]
        period_secs: f64,
        #[arg(long, default_value_t = 0.5)]
        noise: f64,
    },
}

fn parse_downsample_level(s: &str) -> Result<ConsolidationLevel, String> {
    let level: ConsolidationLevel = s.parse().map_err(|e: anyhow::Error| e.to_string())?;
    if ConsolidationLevel::DOWNSAMPLED.contains(&level) {
        Ok(level)
    } else {
        Err(format!("{level} is not a downsampling target (expected 2, 3 or 4)"))
    }
}

/// Run `f` while holding the lock for `job`; print a notice and succeed when
/// another instance holds it.
fn with_job_lock<F>(conn: &mut SqliteConnection, job: JobKind, ttl: Duration, f: F) -> Result<()>
where
    F: FnOnce(&mut SqliteConnection) -> Result<()>,
{
    let Some(lease) = lock::try_acquire(conn, job, ttl)? else {
        println!("skipped: another instance of {job} is running");
        return Ok(());
    };
    let result = f(conn);
    match lock::release(conn, &lease) {
        Ok(true) => {}
        Ok(false) => warn!(%job, "job lock was taken over before release"),
        Err(e) => warn!(%job, error = %e, "could not release job lock"),
    }
    result
}

fn matching_mappings(
    conn: &mut SqliteConnection,
    diagram_type: &str,
    data_source: Option<&str>,
) -> Result<Vec<Mapping>> {
    let mappings = SqliteMappingRepo::new().find_mappings(conn, diagram_type, data_source)?;
    if mappings.is_empty() {
        return Err(ConsolidationError::NoMatchingMappings {
            diagram_type: diagram_type.to_string(),
            source_type: data_source.map(str::to_string),
        }
        .into());
    }
    Ok(mappings)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_url = match cli.database_url {
        Some(url) => url,
        None => get_env_var("DATABASE_URL")?,
    };
    let ttl = Duration::seconds(parse_env_var_or("DIAGRAM_SYNC_LOCK_TTL_SECS", 3600_i64)?);

    if let Cmd::Migrate = cli.cmd {
        let applied = migrate::run_all(&db_url)?;
        println!("applied {applied} migrations");
        return Ok(());
    }
    let mut conn = connect_sqlite(&db_url)?;

    match cli.cmd {
        Cmd::Migrate => {}
        Cmd::SyncMappings { file, dry_run, prune } => {
            let cat = load_catalog_path(&file)?;
            let report = sync_mappings(&mut conn, cat, SyncOptions { dry_run, prune })?;
            let prefix = if dry_run { "dry run: " } else { "" };
            println!("{prefix}{report}");
        }
        Cmd::ProcessEntityMapping { mapping_id, limit } => {
            with_job_lock(&mut conn, JobKind::Translate, ttl, |conn| {
                let mapping = SqliteMappingRepo::new()
                    .load_mapping(conn, mapping_id)?
                    .ok_or(ConsolidationError::UnknownMapping(mapping_id))?;
                let mut store = SqliteStore::new(conn);
                let report = consolidate::translate(&mut store, &mapping, limit)?;
                println!("{}", translate_summary(mapping.id, &report));
                Ok(())
            })?;
        }
        Cmd::DownsampleDiagram {
            diagram_type,
            limit,
            data_source,
            consolidation_type,
        } => {
            with_job_lock(&mut conn, JobKind::Downsample, ttl, |conn| {
                let mut mappings = matching_mappings(conn, &diagram_type, data_source.as_deref())?;
                let mut store = SqliteStore::new(conn);
                for mapping in &mut mappings {
                    let levels = match consolidation_type {
                        Some(level) => vec![level],
                        None => ConsolidationLevel::DOWNSAMPLED.to_vec(),
                    };
                    for level in levels {
                        let report = consolidate::downsample(&mut store, mapping, level, limit)?;
                        println!("{}", resample_summary(mapping.id, level, &report));
                    }
                }
                Ok(())
            })?;
        }
        Cmd::InterpolateDiagram {
            diagram_type,
            limit,
            data_source,
        } => {
            with_job_lock(&mut conn, JobKind::Interpolate, ttl, |conn| {
                let mut mappings = matching_mappings(conn, &diagram_type, data_source.as_deref())?;
                let mut store = SqliteStore::new(conn);
                for mapping in &mut mappings {
                    let report = consolidate::upsample(&mut store, mapping, limit)?;
                    println!("{}", resample_summary(mapping.id, ConsolidationLevel::Minute, &report));
                }
                Ok(())
            })?;
        }
        Cmd::GenerateSeries {
            record_type,
            fields,
            start,
            count,
            step_secs,
            tz,
            time_field,
            seed,
            base,
            amplitude,
            period_secs,
            noise,
        } => {
            if step_secs <= 0 {
                return Err(ConsolidationError::Validation(format!("--step-secs must be positive, got {step_secs}")).into());
            }
            let start = parse_cli_time(&start, tz.as_deref(), DstPolicy::Strict).context("--start")?;
            let mut generator = RandomSeriesGenerator::new(base, amplitude, period_secs, noise, seed);
            let records = generator.records(&time_field, &fields, start, Duration::seconds(step_secs), count);

            let mut store = SqliteStore::new(&mut conn);
            for record in records {
                store.stage(&record_type, record);
            }
            let written = store.commit()?;
            println!("generated {written} {record_type} records");
        }
    }

    Ok(())
}
