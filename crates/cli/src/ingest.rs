//! `shopflow ingest` and `shopflow analyze`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use shopflow_ingest::model::SkipReason;
use shopflow_ingest::{aggregate, normalize_batch, Table, WorkCenterSummary};

use crate::exit_codes::EXIT_ROW_ERRORS;
use crate::report::print_summaries;
use crate::{print_json, CliError, Context};

fn load_input(ctx: &Context, file: &Path, sheet: &Option<String>) -> Result<Table, CliError> {
    let sheet = ctx.sheet(sheet);
    if !shopflow_io::is_workbook(file) {
        if let Some(name) = sheet {
            log::warn!("ignoring sheet '{name}' for delimited input {}", file.display());
        }
    }
    shopflow_io::load_table(file, sheet).map_err(CliError::input)
}

// ============================================================================
// ingest
// ============================================================================

pub fn cmd_ingest(
    ctx: &Context,
    file: &Path,
    sheet: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let table = load_input(ctx, file, &sheet)?;
    let mut store = ctx.open_store()?;

    let report = store
        .ingest_table(&table, &ctx.config.alias_table())
        .map_err(|e| CliError::ingest(e).for_file(file))?;

    if json {
        print_json(&report)?;
    }

    eprintln!(
        "{}: {} row(s) read, {} created, {} updated, {} skipped, {} failed",
        file.display(),
        report.rows_read,
        report.created,
        report.updated,
        report.skipped.len(),
        report.errors.len(),
    );
    for (reason, count) in report.skip_counts() {
        eprintln!("  skipped {count}: {reason}");
    }
    for failure in &report.errors {
        eprintln!("  row {}: {}", failure.source_row, failure.message);
    }

    if !report.errors.is_empty() {
        return Err(CliError {
            code: EXIT_ROW_ERRORS,
            message: format!("{} row(s) were not saved", report.errors.len()),
            hint: Some("re-run with --json for the rejected rows' content".to_string()),
        });
    }
    Ok(())
}

// ============================================================================
// analyze
// ============================================================================

#[derive(Serialize)]
struct Analysis {
    rows_read: usize,
    rows_valid: usize,
    skipped: BTreeMap<SkipReason, usize>,
    work_centers: Vec<WorkCenterSummary>,
}

pub fn cmd_analyze(
    ctx: &Context,
    file: &Path,
    sheet: Option<String>,
    json: bool,
    csv_out: Option<PathBuf>,
) -> Result<(), CliError> {
    let table = load_input(ctx, file, &sheet)?;
    let batch = normalize_batch(&table, &ctx.config.alias_table())
        .map_err(|e| CliError::ingest(e).for_file(file))?;

    let analysis = Analysis {
        rows_read: table.rows.len(),
        rows_valid: batch.rows.len(),
        skipped: batch.skip_counts(),
        work_centers: aggregate(&batch.rows),
    };

    if let Some(ref path) = csv_out {
        shopflow_io::csv::export_summaries(&analysis.work_centers, path)
            .map_err(|e| CliError::general(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        return print_json(&analysis);
    }

    print_summaries(&analysis.work_centers);
    eprintln!(
        "{} row(s) read, {} valid, {} skipped",
        analysis.rows_read,
        analysis.rows_valid,
        batch.skipped.len()
    );
    for (reason, count) in &analysis.skipped {
        eprintln!("  skipped {count}: {reason}");
    }
    Ok(())
}
