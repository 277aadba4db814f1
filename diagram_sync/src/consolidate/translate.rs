//! Source → RAW diagram translation.

use tracing::{debug, info};

use crate::consolidate::{ConsolidationError, TranslateReport, flush_on_error, level_query};
use crate::level::ConsolidationLevel;
use crate::mapping::Mapping;
use crate::record::{MEASUREMENT_TIME, Record, Value};
use crate::store::{Order, Query, RecordStore};

/// Copy source records newer than the newest RAW diagram record of this
/// mapping into new RAW diagram records, at most `limit` of them (`0` means
/// unbounded).
///
/// Cursors are not touched: RAW has none, the newest RAW record is the
/// watermark.
pub fn translate<S: RecordStore>(store: &mut S, mapping: &Mapping, limit: usize) -> anyhow::Result<TranslateReport> {
    let time_field = mapping
        .source_time_field()
        .ok_or(ConsolidationError::MissingTimeMapping {
            mapping_id: mapping.id,
        })?;

    let newest_query = level_query(mapping, ConsolidationLevel::Raw).order_by(MEASUREMENT_TIME, Order::Desc);
    let last_known = store
        .query_one(&mapping.diagram_type, &newest_query)?
        .and_then(|r| r.measurement_time());

    let source_query = Query::new()
        .gt_opt(time_field, last_known)
        .order_by(time_field, Order::Asc)
        .limit(limit);
    let sources = store.query(&mapping.source_type, &source_query)?;

    let staged = stage_translations(store, mapping, time_field, &sources);
    let translated = flush_on_error(store, staged)?;
    store.commit()?;

    info!(
        mapping_id = mapping.id,
        source = %mapping.source_type,
        diagram = %mapping.diagram_type,
        translated,
        "translated source records"
    );
    Ok(TranslateReport {
        last_known_measurement_time: last_known,
        translated,
    })
}

fn stage_translations<S: RecordStore>(
    store: &mut S,
    mapping: &Mapping,
    time_field: &str,
    sources: &[Record],
) -> anyhow::Result<usize> {
    let mut staged = 0;
    for source in sources {
        let time = source
            .time(time_field)
            .ok_or_else(|| ConsolidationError::InvalidTime {
                record_type: mapping.source_type.clone(),
                record_id: source.id(),
                field: time_field.to_string(),
            })?;

        let mut target = Record::new();
        for fm in mapping.field_mappings() {
            target.set(&fm.target_field, source.get(&fm.source_field).unwrap_or(Value::Null));
        }
        target.stamp(&mapping.source_type, ConsolidationLevel::Raw, time);
        debug!(mapping_id = mapping.id, source_id = ?source.id(), %time, "staging raw record");

        store.stage(&mapping.diagram_type, target);
        staged += 1;
    }
    Ok(staged)
}
