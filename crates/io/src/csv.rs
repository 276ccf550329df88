// CSV/TSV load and summary export

use std::io::Read;
use std::path::Path;

use shopflow_ingest::{RawValue, Table, WorkCenterForecast, WorkCenterSummary};

pub fn load(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    load_from_str(&content, delimiter)
}

pub fn load_with_delimiter(path: &Path, delimiter: u8) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    load_from_str(&content, delimiter)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Header line must split into more than one field
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(strip_bom(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            // SAP and Excel exports on Windows default to 1252
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn strip_bom(s: String) -> String {
    match s.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => s,
    }
}

/// Parse delimited text. The first non-blank record is the header row;
/// fully blank records after it are dropped.
pub fn load_from_str(content: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut records: Vec<Vec<RawValue>> = Vec::new();

    for (line_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("line {}: {e}", line_idx + 1))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match headers {
            None => headers = Some(record.iter().map(|f| f.trim().to_string()).collect()),
            Some(_) => records.push(record.iter().map(RawValue::from).collect()),
        }
    }

    let headers = headers.ok_or_else(|| "file contains no header row".to_string())?;
    log::debug!("read {} data row(s) under {} column(s)", records.len(), headers.len());
    Ok(Table::from_records(headers, records))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn export_summaries(summaries: &[WorkCenterSummary], path: &Path) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
    writer
        .write_record([
            "work_center",
            "job_count",
            "planned_hours",
            "actual_hours",
            "backlog_hours",
            "urgency",
            "available_work",
            "backlog_count",
            "efficiency",
        ])
        .map_err(|e| e.to_string())?;

    for s in summaries {
        writer
            .write_record([
                s.work_center.clone(),
                s.job_count.to_string(),
                format_hours(s.planned_hours),
                format_hours(s.actual_hours),
                format_hours(s.backlog_hours),
                s.urgency.to_string(),
                s.available_work.to_string(),
                s.backlog_count.to_string(),
                s.efficiency.to_string(),
            ])
            .map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

pub fn export_forecasts(forecasts: &[WorkCenterForecast], path: &Path) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
    writer
        .write_record(["work_center", "planned", "actual", "remaining", "forecasted"])
        .map_err(|e| e.to_string())?;

    for f in forecasts {
        writer
            .write_record([
                f.work_center.clone(),
                format_hours(f.planned),
                format_hours(f.actual),
                format_hours(f.remaining),
                format_hours(f.forecasted),
            ])
            .map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

fn format_hours(h: f64) -> String {
    format!("{h:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use shopflow_ingest::{aggregate, AliasTable};

    #[test]
    fn sniffs_semicolon_exports() {
        let content = "Order;Oper./Act.;Oper.WorkCenter\n4001;10;MILL\n4002;20;LATHE\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn sniffs_tab_over_comma_in_text() {
        let content = "Order\tDescription\tWork\n4001\tCut, deburr\t2\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn header_is_first_non_blank_record() {
        let content = "\n,,\nOrder,Oper./Act.,Oper.WorkCenter,Work\n\
                       4001,10,MILL,2.5\n,,,\n4002,20,LATHE,\n";
        let table = load_from_str(content, b',').unwrap();
        assert_eq!(table.headers, vec!["Order", "Oper./Act.", "Oper.WorkCenter", "Work"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["Work"], RawValue::Text("2.5".into()));
        assert_eq!(table.rows[1]["Work"], RawValue::Empty);
    }

    #[test]
    fn short_records_are_padded() {
        let table = load_from_str("Order,Oper./Act.,Oper.WorkCenter\n4001,10\n", b',').unwrap();
        assert_eq!(table.rows[0]["Oper.WorkCenter"], RawValue::Empty);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(load_from_str("", b',').is_err());
        assert!(load_from_str("\n\n", b',').is_err());
    }

    #[test]
    fn windows_1252_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Fräsen" with 0xE4 for ä
        let mut bytes = b"Order,Oper./Act.,Oper.WorkCenter,Description\n4001,10,MILL,Fr".to_vec();
        bytes.push(0xE4);
        bytes.extend_from_slice(b"sen\n");
        fs::write(&path, bytes).unwrap();

        let table = load(&path).unwrap();
        assert_eq!(table.rows[0]["Description"], RawValue::Text("Fräsen".into()));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}Order,Oper./Act.,Oper.WorkCenter\n4001,10,MILL\n").unwrap();
        let table = load(&path).unwrap();
        assert_eq!(table.headers[0], "Order");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load(Path::new("/nonexistent/sap.csv")).unwrap_err();
        assert!(err.contains("/nonexistent/sap.csv"));
    }

    #[test]
    fn exported_summaries_have_header_and_rows() {
        let table = load_from_str(
            "Order,Oper./Act.,Oper.WorkCenter,Work,Actual work\n\
             4001,10,MILL,8,2\n4001,20,LATHE,4,4\n",
            b',',
        )
        .unwrap();
        let batch = shopflow_ingest::normalize_batch(&table, &AliasTable::default()).unwrap();
        let summaries = aggregate(&batch.rows);

        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        export_summaries(&summaries, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("work_center,job_count"));
        assert_eq!(lines[1], "LATHE,1,4.00,4.00,0.00,Normal,0,0,100");
        assert_eq!(lines[2], "MILL,1,8.00,2.00,6.00,Critical,0,0,25");
    }
}
