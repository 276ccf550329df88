//! Shop-floor writes: `schedule`, `status`, `delete-job`.

use chrono::NaiveDate;

use shopflow_ingest::OperationStatus;

use crate::{print_json, CliError, Context};

pub fn cmd_schedule(
    ctx: &Context,
    id: Option<i64>,
    date: Option<NaiveDate>,
    list: bool,
    json: bool,
) -> Result<(), CliError> {
    let store = ctx.open_store()?;

    if list {
        let events = store.scheduled_operations().map_err(CliError::store)?;
        if json {
            return print_json(&events);
        }
        for e in &events {
            println!("{}  [{}] {:<24} {}", e.start, e.id, e.title, e.work_center);
        }
        return Ok(());
    }

    let (Some(id), Some(date)) = (id, date) else {
        return Err(CliError::args("schedule needs an operation id and a date")
            .with_hint("shopflow schedule <op-id> <YYYY-MM-DD>, or --list"));
    };

    let op = store.schedule_operation(id, date).map_err(CliError::store)?;
    if json {
        return print_json(&op);
    }
    eprintln!("operation {} ({}) scheduled for {}", op.id, op.work_center, date);
    Ok(())
}

pub fn cmd_status(ctx: &Context, id: i64, status: &str) -> Result<(), CliError> {
    let status: OperationStatus = status.parse().map_err(CliError::store)?;

    let store = ctx.open_store()?;
    let op = store.set_status(id, status).map_err(CliError::store)?;
    eprintln!("operation {} is now {}", op.id, op.status.label());
    Ok(())
}

pub fn cmd_delete_job(ctx: &Context, job: &str) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    store.delete_job(job).map_err(CliError::store)?;
    eprintln!("deleted job {job}");
    Ok(())
}
