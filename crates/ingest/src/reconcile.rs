//! Find-or-create of the Job → WorkOrder → Operation chain for one row.
//!
//! Every function here runs inside a caller-owned transaction. The caller
//! decides whether the unit of work commits or rolls back.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::error::StoreError;
use crate::model::{
    Job, NormalizedRow, Operation, OperationStatus, Outcome, Reconciled, WorkOrder,
};
use crate::store::{
    job_from_row, operation_from_row, work_order_from_row, JOB_COLUMNS, OPERATION_COLUMNS,
    WORK_ORDER_COLUMNS,
};

/// Ensure the hierarchy for `row` exists and carries the row's hours.
///
/// An existing operation only has its hours (and description, when the row
/// has one) refreshed. Status, scheduling and completion belong to the
/// shop-floor workflow and are never touched by re-ingestion.
pub fn reconcile(tx: &Transaction<'_>, row: &NormalizedRow) -> Result<Reconciled, StoreError> {
    let job = match find_job(tx, &row.job_number)? {
        Some(job) => job,
        None => {
            let job = create_job(tx, &row.job_number)?;
            log::info!("created job {}", job.job_number);
            job
        }
    };

    let work_order = match find_work_order(tx, &row.work_order_number, job.id)? {
        Some(wo) => wo,
        None => {
            let wo = create_work_order(tx, &row.work_order_number, job.id)?;
            log::info!("created work order {} under job {}", wo.work_order_number, job.job_number);
            wo
        }
    };

    let (operation, outcome) = match find_operation(tx, work_order.id, row.operation_number)? {
        Some(existing) => {
            let op = update_hours(tx, &existing, row)?;
            log::debug!(
                "updated operation {} of work order {}",
                op.operation_number,
                work_order.work_order_number
            );
            (op, Outcome::Updated)
        }
        None => {
            let op = create_operation(tx, work_order.id, row)?;
            log::info!(
                "created operation {} for work order {}",
                op.operation_number,
                work_order.work_order_number
            );
            (op, Outcome::Created)
        }
    };

    Ok(Reconciled { job, work_order, operation, outcome })
}

fn find_job(tx: &Transaction<'_>, job_number: &str) -> Result<Option<Job>, StoreError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_number = ?1");
    Ok(tx.query_row(&sql, params![job_number], job_from_row).optional()?)
}

fn create_job(tx: &Transaction<'_>, job_number: &str) -> Result<Job, StoreError> {
    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO jobs (job_number, created_at) VALUES (?1, ?2)",
        params![job_number, created_at],
    )?;
    Ok(Job {
        id: tx.last_insert_rowid(),
        job_number: job_number.to_string(),
        created_at,
    })
}

fn find_work_order(
    tx: &Transaction<'_>,
    work_order_number: &str,
    job_id: i64,
) -> Result<Option<WorkOrder>, StoreError> {
    let sql = format!(
        "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE work_order_number = ?1 AND job_id = ?2"
    );
    Ok(tx
        .query_row(&sql, params![work_order_number, job_id], work_order_from_row)
        .optional()?)
}

fn create_work_order(
    tx: &Transaction<'_>,
    work_order_number: &str,
    job_id: i64,
) -> Result<WorkOrder, StoreError> {
    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO work_orders (work_order_number, job_id, created_at) VALUES (?1, ?2, ?3)",
        params![work_order_number, job_id, created_at],
    )?;
    Ok(WorkOrder {
        id: tx.last_insert_rowid(),
        work_order_number: work_order_number.to_string(),
        job_id,
        created_at,
    })
}

fn find_operation(
    tx: &Transaction<'_>,
    work_order_id: i64,
    operation_number: i64,
) -> Result<Option<Operation>, StoreError> {
    let sql = format!(
        "SELECT {OPERATION_COLUMNS} FROM operations \
         WHERE work_order_id = ?1 AND operation_number = ?2"
    );
    Ok(tx
        .query_row(&sql, params![work_order_id, operation_number], operation_from_row)
        .optional()?)
}

fn create_operation(
    tx: &Transaction<'_>,
    work_order_id: i64,
    row: &NormalizedRow,
) -> Result<Operation, StoreError> {
    let created_at = Utc::now();
    let status = OperationStatus::NotStarted;
    tx.execute(
        "INSERT INTO operations (work_order_id, operation_number, work_center, description, \
         planned_hours, actual_hours, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            work_order_id,
            row.operation_number,
            row.work_center,
            row.description,
            row.planned_hours,
            row.actual_hours,
            status,
            created_at,
        ],
    )?;
    Ok(Operation {
        id: tx.last_insert_rowid(),
        work_order_id,
        operation_number: row.operation_number,
        work_center: row.work_center.clone(),
        description: row.description.clone(),
        planned_hours: row.planned_hours,
        actual_hours: row.actual_hours,
        status,
        scheduled_date: None,
        completed_at: None,
        created_at,
    })
}

fn update_hours(
    tx: &Transaction<'_>,
    existing: &Operation,
    row: &NormalizedRow,
) -> Result<Operation, StoreError> {
    let description = row.description.clone().or_else(|| existing.description.clone());
    tx.execute(
        "UPDATE operations SET planned_hours = ?2, actual_hours = ?3, description = ?4 \
         WHERE id = ?1",
        params![existing.id, row.planned_hours, row.actual_hours, description],
    )?;
    Ok(Operation {
        planned_hours: row.planned_hours,
        actual_hours: row.actual_hours,
        description,
        ..existing.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn row(job: &str, wo: &str, op: i64, wc: &str, planned: f64, actual: f64) -> NormalizedRow {
        NormalizedRow {
            source_row: 1,
            job_number: job.into(),
            work_order_number: wo.into(),
            operation_number: op,
            work_center: wc.into(),
            description: None,
            planned_hours: planned,
            actual_hours: actual,
        }
    }

    #[test]
    fn creates_full_chain_on_first_sight() {
        let mut store = Store::in_memory().unwrap();
        let rec = store.reconcile_one(&row("J1", "J1", 10, "MILL", 8.0, 2.0)).unwrap();
        assert_eq!(rec.outcome, Outcome::Created);
        assert_eq!(rec.job.job_number, "J1");
        assert_eq!(rec.work_order.job_id, rec.job.id);
        assert_eq!(rec.operation.work_order_id, rec.work_order.id);
        assert_eq!(rec.operation.status, OperationStatus::NotStarted);
        assert_eq!(rec.operation.planned_hours, 8.0);
    }

    #[test]
    fn second_sighting_updates_hours_in_place() {
        let mut store = Store::in_memory().unwrap();
        let first = store.reconcile_one(&row("J1", "J1", 10, "MILL", 8.0, 2.0)).unwrap();
        let second = store.reconcile_one(&row("J1", "J1", 10, "MILL", 9.0, 5.0)).unwrap();
        assert_eq!(second.outcome, Outcome::Updated);
        assert_eq!(second.operation.id, first.operation.id);
        assert_eq!(second.job.id, first.job.id);
        assert_eq!(second.work_order.id, first.work_order.id);

        let stored = store.operation(first.operation.id).unwrap();
        assert_eq!(stored.planned_hours, 9.0);
        assert_eq!(stored.actual_hours, 5.0);
        assert_eq!(store.counts().unwrap().operations, 1);
    }

    #[test]
    fn update_leaves_workflow_fields_alone() {
        let mut store = Store::in_memory().unwrap();
        let first = store.reconcile_one(&row("J1", "J1", 10, "MILL", 8.0, 2.0)).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        store.schedule_operation(first.operation.id, date).unwrap();
        store.set_status(first.operation.id, OperationStatus::Ready).unwrap();

        let again = store.reconcile_one(&row("J1", "J1", 10, "LATHE", 1.0, 1.0)).unwrap();
        assert_eq!(again.operation.status, OperationStatus::Ready);
        assert_eq!(again.operation.scheduled_date, Some(date));
        assert_eq!(again.operation.work_center, "MILL");
    }

    #[test]
    fn description_is_kept_when_row_has_none() {
        let mut store = Store::in_memory().unwrap();
        let mut with_desc = row("J1", "J1", 10, "MILL", 8.0, 2.0);
        with_desc.description = Some("Deburr".into());
        store.reconcile_one(&with_desc).unwrap();
        let again = store.reconcile_one(&row("J1", "J1", 10, "MILL", 8.0, 3.0)).unwrap();
        assert_eq!(again.operation.description.as_deref(), Some("Deburr"));
    }

    #[test]
    fn operations_share_work_order() {
        let mut store = Store::in_memory().unwrap();
        let a = store.reconcile_one(&row("J1", "J1", 10, "MILL", 1.0, 0.0)).unwrap();
        let b = store.reconcile_one(&row("J1", "J1", 20, "LATHE", 1.0, 0.0)).unwrap();
        assert_eq!(a.work_order.id, b.work_order.id);
        assert_ne!(a.operation.id, b.operation.id);
        let counts = store.counts().unwrap();
        assert_eq!((counts.jobs, counts.work_orders, counts.operations), (1, 1, 2));
    }
}
