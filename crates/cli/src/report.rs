//! Read-only views over the database: `report`, `forecast`, `jobs`.

use std::path::PathBuf;

use shopflow_ingest::{aggregate, forecast_report, WorkCenterForecast, WorkCenterSummary};

use crate::{print_json, CliError, Context};

pub fn print_summaries(summaries: &[WorkCenterSummary]) {
    if summaries.is_empty() {
        println!("(no operations)");
        return;
    }
    println!(
        "{:<16} {:>5} {:>9} {:>9} {:>9} {:<9} {:>5} {:>7} {:>5}",
        "WORK CENTER", "OPS", "PLANNED", "ACTUAL", "BACKLOG", "URGENCY", "READY", "WAITING", "EFF%"
    );
    for s in summaries {
        println!(
            "{:<16} {:>5} {:>9.2} {:>9.2} {:>9.2} {:<9} {:>5} {:>7} {:>5}",
            s.work_center,
            s.job_count,
            s.planned_hours,
            s.actual_hours,
            s.backlog_hours,
            s.urgency.to_string(),
            s.available_work,
            s.backlog_count,
            s.efficiency,
        );
    }
}

fn print_forecasts(forecasts: &[WorkCenterForecast], total: f64) {
    if forecasts.is_empty() {
        println!("(no operations)");
        return;
    }
    println!(
        "{:<16} {:>9} {:>9} {:>9} {:>10}",
        "WORK CENTER", "PLANNED", "ACTUAL", "REMAINING", "FORECAST"
    );
    for f in forecasts {
        println!(
            "{:<16} {:>9.2} {:>9.2} {:>9.2} {:>10.2}",
            f.work_center, f.planned, f.actual, f.remaining, f.forecasted
        );
    }
    println!("{:<16} {:>9} {:>9} {:>9} {:>10.2}", "TOTAL", "", "", "", total);
}

// ============================================================================
// report
// ============================================================================

pub fn cmd_report(ctx: &Context, json: bool, csv_out: Option<PathBuf>) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let ops = store.operations().map_err(CliError::store)?;
    let summaries = aggregate(&ops);

    if let Some(ref path) = csv_out {
        shopflow_io::csv::export_summaries(&summaries, path)
            .map_err(|e| CliError::general(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        return print_json(&summaries);
    }
    print_summaries(&summaries);
    Ok(())
}

// ============================================================================
// forecast
// ============================================================================

#[derive(serde::Serialize)]
struct ForecastOutput {
    total_forecasted: f64,
    work_centers: Vec<WorkCenterForecast>,
}

pub fn cmd_forecast(ctx: &Context, json: bool, csv_out: Option<PathBuf>) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let ops = store.operations().map_err(CliError::store)?;

    // Each center is forecast from its own history; the total is their sum.
    let work_centers = forecast_report(&ops);
    let output = ForecastOutput {
        total_forecasted: work_centers.iter().map(|f| f.forecasted).sum(),
        work_centers,
    };

    if let Some(ref path) = csv_out {
        shopflow_io::csv::export_forecasts(&output.work_centers, path)
            .map_err(|e| CliError::general(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        return print_json(&output);
    }
    print_forecasts(&output.work_centers, output.total_forecasted);
    Ok(())
}

// ============================================================================
// jobs
// ============================================================================

pub fn cmd_jobs(ctx: &Context, json: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let jobs = store.jobs().map_err(CliError::store)?;

    if json {
        return print_json(&jobs);
    }

    if jobs.is_empty() {
        println!("(no jobs)");
        return Ok(());
    }
    for job in &jobs {
        println!("{}  (created {})", job.job_number, job.created_at.format("%Y-%m-%d %H:%M"));
        for wo in &job.work_orders {
            println!("  {}", wo.work_order_number);
            for op in &wo.operations {
                let scheduled = op
                    .scheduled_date
                    .map(|d| format!("  scheduled {d}"))
                    .unwrap_or_default();
                println!(
                    "    [{}] op {:<5} {:<12} {:>7.2}/{:<7.2} {}{}",
                    op.id,
                    op.operation_number,
                    op.work_center,
                    op.actual_hours,
                    op.planned_hours,
                    op.status.label(),
                    scheduled,
                );
            }
        }
    }
    Ok(())
}
