//! Mapping catalog synchronization.
//!
//! ## What this does
//! - Takes a normalized [`MappingCatalog`] (desired state).
//! - Compares it with the mappings stored in SQLite (current state).
//! - Creates missing mappings, replaces changed field mappings, creates any
//!   missing cursor and, with `prune`, deletes mappings that are no longer
//!   listed (field mappings and cursors cascade).
//!
//! Existing watermarks are never reset: re-syncing an unchanged catalog is a
//! no-op and changing a mapping's fields keeps its cursors.
//!
//! ## Transactions
//! Everything runs inside one `BEGIN IMMEDIATE` transaction, so the catalog is
//! applied entirely or not at all.
//!
//! ## Dry-run
//! With [`SyncOptions::dry_run`] the report is computed the same way but
//! nothing is written.

use std::collections::HashMap;
use std::fmt;

use diesel::SqliteConnection;
use tracing::info;

use crate::level::ConsolidationLevel;
use crate::mapping::config::{MappingCatalog, normalize_catalog};
use crate::mapping::repo::SqliteMappingRepo;
use crate::mapping::{Mapping, MappingRepo};

/// Options for catalog synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute the report only.
    pub dry_run: bool,
    /// Delete stored mappings that are absent from the catalog.
    pub prune: bool,
}

/// What a sync did (or, in dry-run mode, would do). Pairs are
/// `(source_type, diagram_type)`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Mappings that did not exist yet.
    pub created: Vec<(String, String)>,
    /// Mappings whose field mappings changed or that lacked a cursor.
    pub updated: Vec<(String, String)>,
    /// Mappings already matching the catalog.
    pub unchanged: usize,
    /// Mappings deleted because the catalog no longer lists them.
    pub pruned: Vec<(String, String)>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, updated {}, unchanged {}, pruned {}",
            self.created.len(),
            self.updated.len(),
            self.unchanged,
            self.pruned.len()
        )
    }
}

fn is_current(stored: &Mapping, wanted: &[crate::mapping::FieldMapping]) -> bool {
    stored.field_mappings() == wanted
        && ConsolidationLevel::RESAMPLED
            .iter()
            .all(|&level| stored.cursor(level).is_some())
}

/// Sync the mapping catalog into SQLite.
pub fn sync_mappings(
    conn: &mut SqliteConnection,
    mut cat: MappingCatalog,
    opt: SyncOptions,
) -> anyhow::Result<SyncReport> {
    normalize_catalog(&mut cat)?;
    let repo = SqliteMappingRepo::new();

    let report = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let mut existing: HashMap<(String, String), Mapping> = repo
            .list_mappings(conn)?
            .into_iter()
            .map(|m| ((m.source_type.clone(), m.diagram_type.clone()), m))
            .collect();

        let mut report = SyncReport::default();
        for cfg in &cat.mapping {
            let key = (cfg.source_type.clone(), cfg.diagram_type.clone());
            let wanted = cfg.field_mappings();
            match existing.remove(&key) {
                Some(stored) if is_current(&stored, &wanted) => report.unchanged += 1,
                found => {
                    if !opt.dry_run {
                        repo.upsert_mapping(conn, &cfg.source_type, &cfg.diagram_type, &wanted)?;
                    }
                    if found.is_some() {
                        report.updated.push(key);
                    } else {
                        report.created.push(key);
                    }
                }
            }
        }

        if opt.prune {
            let mut stale: Vec<Mapping> = existing.into_values().collect();
            stale.sort_by_key(|m| m.id);
            for m in stale {
                if !opt.dry_run {
                    repo.delete_mapping(conn, m.id)?;
                }
                report.pruned.push((m.source_type, m.diagram_type));
            }
        }
        Ok(report)
    })?;

    info!(
        dry_run = opt.dry_run,
        created = report.created.len(),
        updated = report.updated.len(),
        unchanged = report.unchanged,
        pruned = report.pruned.len(),
        "synced mapping catalog"
    );
    Ok(report)
}
