use std::collections::BTreeMap;

use crate::columns::{resolve, AliasTable, Field, ResolvedColumns};
use crate::error::IngestError;
use crate::model::{count_reasons, NormalizedRow, RawRow, RawValue, SkipReason, SkipReport, Table};

/// Normalized rows of one batch plus the rows that were dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub rows: Vec<NormalizedRow>,
    pub skipped: Vec<SkipReport>,
}

impl NormalizedBatch {
    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        count_reasons(&self.skipped)
    }
}

/// Resolve the schema once, then normalize every row.
///
/// Only a schema failure is fatal. Bad rows land in `skipped`.
pub fn normalize_batch(
    table: &Table,
    aliases: &AliasTable,
) -> Result<NormalizedBatch, IngestError> {
    let columns = resolve(&table.headers, aliases)?;
    let mut batch = NormalizedBatch::default();

    for (idx, row) in table.rows.iter().enumerate() {
        let source_row = idx + 1;
        match normalize_row(row, &columns, source_row) {
            Ok(normalized) => batch.rows.push(normalized),
            Err(reason) => {
                log::warn!("row {source_row}: skipped ({reason})");
                batch.skipped.push(SkipReport { source_row, reason });
            }
        }
    }

    log::info!(
        "normalized {} row(s), skipped {}",
        batch.rows.len(),
        batch.skipped.len()
    );
    Ok(batch)
}

/// Extract one canonical record from a raw row.
pub fn normalize_row(
    row: &RawRow,
    columns: &ResolvedColumns,
    source_row: usize,
) -> Result<NormalizedRow, SkipReason> {
    let job_number = first_text(row, columns, Field::Job).ok_or(SkipReason::MissingJobNumber)?;

    // Many extracts only carry the order number; it then doubles as the work order.
    let work_order_number =
        first_text(row, columns, Field::WorkOrder).unwrap_or_else(|| job_number.clone());

    let operation_number =
        first_operation_number(row, columns, source_row).ok_or(SkipReason::MissingOperationNumber)?;

    let work_center =
        first_text(row, columns, Field::WorkCenter).ok_or(SkipReason::MissingWorkCenter)?;

    Ok(NormalizedRow {
        source_row,
        job_number,
        work_order_number,
        operation_number,
        work_center,
        description: first_text(row, columns, Field::Description),
        planned_hours: first_hours(row, columns, Field::PlannedHours, source_row),
        actual_hours: first_hours(row, columns, Field::ActualHours, source_row),
    })
}

fn cells<'a>(
    row: &'a RawRow,
    columns: &'a ResolvedColumns,
    field: Field,
) -> impl Iterator<Item = (&'a str, &'a RawValue)> + 'a {
    columns
        .columns(field)
        .iter()
        .filter_map(move |col| row.get(col).map(|v| (col.as_str(), v)))
        .filter(|(_, v)| !v.is_blank())
}

fn first_text(row: &RawRow, columns: &ResolvedColumns, field: Field) -> Option<String> {
    cells(row, columns, field).map(|(_, v)| v.as_text()).next()
}

fn first_operation_number(
    row: &RawRow,
    columns: &ResolvedColumns,
    source_row: usize,
) -> Option<i64> {
    for (col, value) in cells(row, columns, Field::Operation) {
        match coerce_operation_number(value) {
            Some(n) => return Some(n),
            None => log::warn!(
                "row {source_row}: invalid operation number {:?} in column '{col}'",
                value.as_text()
            ),
        }
    }
    None
}

fn first_hours(row: &RawRow, columns: &ResolvedColumns, field: Field, source_row: usize) -> f64 {
    for (col, value) in cells(row, columns, field) {
        match coerce_hours(value) {
            Some(h) => return h,
            None => log::warn!(
                "row {source_row}: ignoring non-numeric {field} {:?} in column '{col}'",
                value.as_text()
            ),
        }
    }
    0.0
}

/// Float-then-truncate, so `"10.0"` and `10.0` both give `10`.
pub fn coerce_operation_number(value: &RawValue) -> Option<i64> {
    let n = value.as_number()?;
    if !n.is_finite() || n >= i64::MAX as f64 || n < i64::MIN as f64 {
        return None;
    }
    Some(n.trunc() as i64)
}

/// Hours must be finite and non-negative.
pub fn coerce_hours(value: &RawValue) -> Option<f64> {
    value.as_number().filter(|h| h.is_finite() && *h >= 0.0)
}
