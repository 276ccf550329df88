// File I/O operations

use std::path::Path;

use shopflow_ingest::Table;

pub mod csv;
pub mod xlsx;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// True when the extension names a format calamine reads.
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

/// Load a work-order extract, picking the reader from the file extension.
/// Anything that is not a workbook is read as delimited text.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, String> {
    if is_workbook(path) {
        return xlsx::load(path, sheet);
    }
    let is_tab = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tsv") || e.eq_ignore_ascii_case("tab"))
        .unwrap_or(false);
    if is_tab {
        csv::load_with_delimiter(path, b'\t')
    } else {
        csv::load(path)
    }
}
