//! Mapping catalog: parsing, normalization, and loading.
//!
//! The catalog is a TOML file listing every source type → diagram type
//! pairing and its field copy rules:
//!
//! ```toml
//! [[mapping]]
//! source_type = "station_reading"
//! diagram_type = "weather"
//! [mapping.fields]
//! recorded_at = "measurement_time"
//! temp_c = "temperature"
//! ```
//!
//! Keys of `fields` are source fields, values are diagram fields.
//!
//! Normalization:
//! - trims every name and rejects empty names or names outside `[A-Za-z0-9_]`
//! - rejects a diagram field targeted twice within one mapping
//! - rejects the storage-managed targets `id`, `source` and `consolidation_level`
//! - requires exactly one field targeting `measurement_time`
//! - rejects duplicate (source_type, diagram_type) pairs
//!
//! Entrypoints: [`load_catalog_str`], [`load_catalog_path`], [`normalize_catalog`].

use std::collections::HashSet;

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use toml::from_str;

use crate::mapping::FieldMapping;
use crate::record::{CONSOLIDATION_LEVEL, ID, MEASUREMENT_TIME, SOURCE};

/// Top-level catalog: a list of mappings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MappingCatalog {
    /// `[[mapping]]` entries in file order.
    #[serde(default)]
    pub mapping: Vec<MappingCfg>,
}

/// One `[[mapping]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MappingCfg {
    /// Source record type (e.g., "station_reading").
    pub source_type: String,
    /// Diagram record type (e.g., "weather").
    pub diagram_type: String,
    /// Source field -> diagram field.
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

impl MappingCfg {
    /// Copy rules in file order.
    pub fn field_mappings(&self) -> Vec<FieldMapping> {
        self.fields
            .iter()
            .map(|(source, target)| FieldMapping::new(source.as_str(), target.as_str()))
            .collect()
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Names that changed when trimming.
    pub names_trimmed: usize,
}

fn is_plain_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn normalize_name(raw: &mut String, what: &str, report: &mut NormalizationReport) -> anyhow::Result<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("{what} cannot be empty after trimming");
    }
    if !is_plain_name(trimmed) {
        bail!("{what} '{trimmed}' may only contain ASCII letters, digits and '_'");
    }
    if trimmed.len() != raw.len() {
        report.names_trimmed += 1;
        *raw = trimmed.to_string();
    }
    Ok(())
}

/// Normalize a catalog in place.
///
/// Errors:
/// - empty or malformed names
/// - a source field listed twice after trimming
/// - a diagram field targeted twice, or a reserved target
/// - zero or several `measurement_time` targets
/// - duplicate (source_type, diagram_type) pairs
pub fn normalize_catalog(cat: &mut MappingCatalog) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();
    let mut seen_pairs = HashSet::new();

    for m in &mut cat.mapping {
        normalize_name(&mut m.source_type, "source_type", &mut report)?;
        normalize_name(&mut m.diagram_type, "diagram_type", &mut report)?;
        let pair = format!("{} -> {}", m.source_type, m.diagram_type);

        let mut fields = IndexMap::with_capacity(m.fields.len());
        let mut seen_targets = HashSet::new();
        for (mut source, mut target) in std::mem::take(&mut m.fields) {
            normalize_name(&mut source, "source field", &mut report)
                .with_context(|| format!("mapping {pair}"))?;
            normalize_name(&mut target, "diagram field", &mut report)
                .with_context(|| format!("mapping {pair}"))?;
            if [ID, SOURCE, CONSOLIDATION_LEVEL].contains(&target.as_str()) {
                bail!("mapping {pair}: diagram field '{target}' is managed by the engine");
            }
            if !seen_targets.insert(target.clone()) {
                bail!("mapping {pair}: diagram field '{target}' is targeted twice");
            }
            if fields.contains_key(&source) {
                bail!("mapping {pair}: source field '{source}' is listed twice");
            }
            fields.insert(source, target);
        }

        let time_targets = fields.values().filter(|t| *t == MEASUREMENT_TIME).count();
        if time_targets != 1 {
            bail!("mapping {pair}: exactly one field must target '{MEASUREMENT_TIME}', found {time_targets}");
        }
        m.fields = fields;

        if !seen_pairs.insert((m.source_type.clone(), m.diagram_type.clone())) {
            bail!("duplicate mapping {pair}");
        }
    }

    Ok(report)
}

/// Parse and normalize a catalog from a TOML string.
pub fn load_catalog_str(toml_str: &str) -> anyhow::Result<MappingCatalog> {
    let mut cat: MappingCatalog = from_str(toml_str).context("failed to parse mapping catalog TOML")?;
    let report = normalize_catalog(&mut cat).context("normalize_catalog failed")?;
    tracing::debug!(mappings = cat.mapping.len(), names_trimmed = report.names_trimmed, "loaded mapping catalog");
    Ok(cat)
}

/// Read a catalog TOML file from disk, parse, and normalize it.
pub fn load_catalog_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<MappingCatalog> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read mapping catalog {}", path.as_ref().display()))?;
    load_catalog_str(&text)
}
