// SQLite-backed store for the job hierarchy

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::columns::AliasTable;
use crate::error::{IngestError, StoreError};
use crate::model::{
    IngestReport, Job, JobListing, NormalizedRow, Operation, OperationStatus, Outcome, Reconciled,
    RowFailure, ScheduleEvent, Table, WorkOrder, WorkOrderListing,
};
use crate::normalize::normalize_batch;
use crate::reconcile::reconcile;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY,
    job_number TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS work_orders (
    id INTEGER PRIMARY KEY,
    work_order_number TEXT NOT NULL UNIQUE,
    job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY,
    work_order_id INTEGER NOT NULL REFERENCES work_orders(id) ON DELETE CASCADE,
    operation_number INTEGER NOT NULL,
    work_center TEXT NOT NULL,
    description TEXT,
    planned_hours REAL NOT NULL CHECK (planned_hours >= 0),
    actual_hours REAL NOT NULL DEFAULT 0 CHECK (actual_hours >= 0),
    status TEXT NOT NULL DEFAULT 'not_started',
    scheduled_date TEXT,                 -- YYYY-MM-DD
    completed_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (work_order_id, operation_number)
);

CREATE INDEX IF NOT EXISTS idx_work_orders_job ON work_orders(job_id);
CREATE INDEX IF NOT EXISTS idx_operations_work_center ON operations(work_center);
"#;

pub(crate) const JOB_COLUMNS: &str = "id, job_number, created_at";
pub(crate) const WORK_ORDER_COLUMNS: &str = "id, work_order_number, job_id, created_at";
pub(crate) const OPERATION_COLUMNS: &str = "id, work_order_id, operation_number, work_center, \
     description, planned_hours, actual_hours, status, scheduled_date, completed_at, created_at";

pub(crate) fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        job_number: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn work_order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkOrder> {
    Ok(WorkOrder {
        id: row.get(0)?,
        work_order_number: row.get(1)?,
        job_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn operation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: row.get(0)?,
        work_order_id: row.get(1)?,
        operation_number: row.get(2)?,
        work_center: row.get(3)?,
        description: row.get(4)?,
        planned_hours: row.get(5)?,
        actual_hours: row.get(6)?,
        status: row.get(7)?,
        scheduled_date: row.get(8)?,
        completed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ToSql for OperationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OperationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: StoreError| {
            log::error!("unreadable operation status in database: {e}");
            FromSqlError::InvalidType
        })
    }
}

/// Row counts per entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub jobs: usize,
    pub work_orders: usize,
    pub operations: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    fn bootstrap(&self) -> Result<(), StoreError> {
        // Cascading deletes depend on this; SQLite ships with it off.
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Full pipeline: resolve columns, normalize, reconcile row by row.
    ///
    /// A schema failure aborts before anything is written. Failed rows are
    /// reported with their original cell content.
    pub fn ingest_table(
        &mut self,
        table: &Table,
        aliases: &AliasTable,
    ) -> Result<IngestReport, IngestError> {
        let batch = normalize_batch(table, aliases)?;
        let mut report =
            self.reconcile_rows(&batch.rows, |row| table.render_row(row.source_row - 1))?;
        report.rows_read = table.rows.len();
        report.skipped = batch.skipped;
        Ok(report)
    }

    /// Reconcile already-normalized rows, one transaction per row.
    pub fn ingest(&mut self, rows: &[NormalizedRow]) -> Result<IngestReport, IngestError> {
        let mut report = self.reconcile_rows(rows, NormalizedRow::render)?;
        report.rows_read = rows.len();
        Ok(report)
    }

    fn reconcile_rows<F>(
        &mut self,
        rows: &[NormalizedRow],
        render_raw: F,
    ) -> Result<IngestReport, IngestError>
    where
        F: Fn(&NormalizedRow) -> BTreeMap<String, String>,
    {
        let mut report = IngestReport::default();

        for row in rows {
            let tx = self
                .conn
                .transaction()
                .map_err(|e| IngestError::Backend(format!("cannot begin transaction: {e}")))?;

            match reconcile(&tx, row) {
                Ok(reconciled) => {
                    tx.commit().map_err(|e| {
                        IngestError::Backend(format!("cannot commit row {}: {e}", row.source_row))
                    })?;
                    match reconciled.outcome {
                        Outcome::Created => report.created += 1,
                        Outcome::Updated => report.updated += 1,
                    }
                }
                Err(err) if err.is_fatal() => {
                    log::error!(
                        "row {}: backend failure, aborting batch after {} row(s): {err}",
                        row.source_row,
                        report.processed()
                    );
                    return Err(IngestError::Backend(err.to_string()));
                }
                Err(err) => {
                    tx.rollback().map_err(|e| {
                        let row = row.source_row;
                        IngestError::Backend(format!("cannot roll back row {row}: {e}"))
                    })?;
                    let raw = render_raw(row);
                    log::error!("row {}: {err} ({raw:?})", row.source_row);
                    report.errors.push(RowFailure {
                        source_row: row.source_row,
                        message: err.to_string(),
                        raw,
                    });
                }
            }
        }

        log::info!(
            "ingested {} row(s): {} created, {} updated, {} failed",
            rows.len(),
            report.created,
            report.updated,
            report.errors.len()
        );
        Ok(report)
    }

    /// Reconcile a single row in its own transaction.
    pub fn reconcile_one(&mut self, row: &NormalizedRow) -> Result<Reconciled, StoreError> {
        let tx = self.conn.transaction()?;
        let reconciled = reconcile(&tx, row)?;
        tx.commit()?;
        Ok(reconciled)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        let count = |table: &str| -> Result<usize, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreCounts {
            jobs: count("jobs")?,
            work_orders: count("work_orders")?,
            operations: count("operations")?,
        })
    }

    /// Distinct work centers, sorted.
    pub fn work_centers(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT work_center FROM operations ORDER BY work_center")?;
        let names = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn operations(&self) -> Result<Vec<Operation>, StoreError> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map([], operation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    pub fn operations_for(&self, work_center: &str) -> Result<Vec<Operation>, StoreError> {
        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM operations WHERE work_center = ?1 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map(params![work_center], operation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    pub fn operation(&self, id: i64) -> Result<Operation, StoreError> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], operation_from_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound { entity: "operation", key: id.to_string() })
    }

    /// Every job with its work orders and their operations.
    pub fn jobs(&self) -> Result<Vec<JobListing>, StoreError> {
        let mut by_work_order: HashMap<i64, Vec<Operation>> = HashMap::new();
        for op in self.operations()? {
            by_work_order.entry(op.work_order_id).or_default().push(op);
        }
        for ops in by_work_order.values_mut() {
            ops.sort_by_key(|o| o.operation_number);
        }

        let sql =
            format!("SELECT {WORK_ORDER_COLUMNS} FROM work_orders ORDER BY work_order_number");
        let mut stmt = self.conn.prepare(&sql)?;
        let work_orders = stmt
            .query_map([], work_order_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_job: HashMap<i64, Vec<WorkOrderListing>> = HashMap::new();
        for wo in work_orders {
            by_job.entry(wo.job_id).or_default().push(WorkOrderListing {
                operations: by_work_order.remove(&wo.id).unwrap_or_default(),
                work_order_number: wo.work_order_number,
            });
        }

        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY job_number");
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs
            .into_iter()
            .map(|job| JobListing {
                work_orders: by_job.remove(&job.id).unwrap_or_default(),
                job_number: job.job_number,
                created_at: job.created_at,
            })
            .collect())
    }

    /// Operations with a scheduled date, earliest first.
    pub fn scheduled_operations(&self) -> Result<Vec<ScheduleEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, w.work_order_number, o.operation_number, o.scheduled_date, o.work_center \
             FROM operations o JOIN work_orders w ON w.id = o.work_order_id \
             WHERE o.scheduled_date IS NOT NULL \
             ORDER BY o.scheduled_date, o.id",
        )?;
        let events = stmt
            .query_map([], |r| {
                let work_order: String = r.get(1)?;
                let operation_number: i64 = r.get(2)?;
                Ok(ScheduleEvent {
                    id: r.get(0)?,
                    title: format!("{work_order} - Op {operation_number}"),
                    start: r.get(3)?,
                    work_center: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Workflow writes
    // -----------------------------------------------------------------------

    pub fn schedule_operation(&self, id: i64, date: NaiveDate) -> Result<Operation, StoreError> {
        let changed = self.conn.execute(
            "UPDATE operations SET scheduled_date = ?2 WHERE id = ?1",
            params![id, date],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "operation", key: id.to_string() });
        }
        self.operation(id)
    }

    /// Move an operation to `status`. Completing stamps `completed_at` once;
    /// leaving Completed clears it.
    pub fn set_status(&self, id: i64, status: OperationStatus) -> Result<Operation, StoreError> {
        let changed = self.conn.execute(
            "UPDATE operations SET status = ?2, \
             completed_at = CASE WHEN ?2 = 'completed' \
             THEN COALESCE(completed_at, ?3) ELSE NULL END \
             WHERE id = ?1",
            params![id, status, Utc::now()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "operation", key: id.to_string() });
        }
        self.operation(id)
    }

    /// Delete a job together with its work orders and operations.
    pub fn delete_job(&self, job_number: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM jobs WHERE job_number = ?1", params![job_number])?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "job", key: job_number.to_string() });
        }
        log::info!("deleted job {job_number}");
        Ok(())
    }
}
