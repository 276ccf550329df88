// Excel/ODS load via calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use shopflow_ingest::{RawValue, Table};

/// Load one worksheet of an Excel file (xlsx, xls, xlsb, ods).
///
/// `sheet` selects a worksheet by name (case-insensitive); the first sheet is
/// used when it is `None`. The first non-blank row is the header row.
pub fn load(path: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file {}: {}", path.display(), e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err("Excel file contains no sheets".to_string());
    }

    let sheet_name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| {
                format!(
                    "sheet '{}' not found (available: {})",
                    wanted,
                    sheet_names.join(", ")
                )
            })?,
        None => sheet_names[0].clone(),
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let mut headers: Option<Vec<String>> = None;
    let mut records: Vec<Vec<RawValue>> = Vec::new();

    for row in range.rows() {
        let cells: Vec<RawValue> = row.iter().map(cell_value).collect();
        if cells.iter().all(RawValue::is_blank) {
            continue;
        }
        match headers {
            None => headers = Some(cells.iter().map(RawValue::as_text).collect()),
            Some(_) => records.push(cells),
        }
    }

    let headers =
        headers.ok_or_else(|| format!("sheet '{}' contains no header row", sheet_name))?;
    log::debug!(
        "sheet '{}': {} data row(s) under {} column(s)",
        sheet_name,
        records.len(),
        headers.len()
    );
    Ok(Table::from_records(headers, records))
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::from(s.as_str()),
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        // Error cells carry no usable value
        Data::Error(e) => RawValue::Text(format!("#{:?}", e)),
        // Dates as serials; nothing in a work-order extract keys on them
        Data::DateTime(dt) => RawValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::from(s.as_str()),
    }
}
