use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Tabular input
// ---------------------------------------------------------------------------

/// One spreadsheet cell as delivered by the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawValue {
    /// Empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    /// Cell rendered as trimmed text. Integral numbers print without a
    /// fractional part so `4001234.0` keys the same job as `"4001234"`.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Self::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    /// Numeric view of the cell; `None` for blanks, booleans and unparseable text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Empty | Self::Bool(_) => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// One data row keyed by header text exactly as it appeared in the file.
pub type RawRow = BTreeMap<String, RawValue>;

/// Parsed tabular input: header names plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    /// Build from positional records, pairing each cell with its header.
    /// Short records are padded with `Empty`; surplus cells are dropped.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<RawValue>>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = RawRow::new();
                let mut cells = record.into_iter();
                for header in &headers {
                    let value = cells.next().unwrap_or(RawValue::Empty);
                    // First occurrence of a duplicated header wins.
                    row.entry(header.clone()).or_insert(value);
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Row content as `header -> text`, for diagnostics.
    pub fn render_row(&self, index: usize) -> BTreeMap<String, String> {
        self.rows
            .get(index)
            .map(|row| {
                row.iter()
                    .filter(|(_, v)| !v.is_blank())
                    .map(|(k, v)| (k.clone(), v.as_text()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Normalized rows
// ---------------------------------------------------------------------------

/// One row reduced to the canonical schema. Never persisted as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    /// 1-based data row number (header excluded).
    pub source_row: usize,
    pub job_number: String,
    pub work_order_number: String,
    pub operation_number: i64,
    pub work_center: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub planned_hours: f64,
    pub actual_hours: f64,
}

impl NormalizedRow {
    pub fn remaining_work(&self) -> f64 {
        remaining_work(self.planned_hours, self.actual_hours)
    }

    /// Field view used when the original cells are not at hand.
    pub fn render(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert("job_number".into(), self.job_number.clone());
        out.insert("work_order_number".into(), self.work_order_number.clone());
        out.insert("operation_number".into(), self.operation_number.to_string());
        out.insert("work_center".into(), self.work_center.clone());
        out.insert("planned_hours".into(), self.planned_hours.to_string());
        out.insert("actual_hours".into(), self.actual_hours.to_string());
        if let Some(ref d) = self.description {
            out.insert("description".into(), d.clone());
        }
        out
    }
}

/// Unworked hours. Never negative, even when actual exceeds plan.
pub fn remaining_work(planned_hours: f64, actual_hours: f64) -> f64 {
    (planned_hours - actual_hours).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingJobNumber,
    MissingOperationNumber,
    MissingWorkCenter,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJobNumber => write!(f, "missing job number"),
            Self::MissingOperationNumber => write!(f, "missing operation number"),
            Self::MissingWorkCenter => write!(f, "missing work center"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReport {
    pub source_row: usize,
    pub reason: SkipReason,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    NotStarted,
    Ready,
    InProgress,
    Completed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Human label as shown on shop-floor screens.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Ready => "Ready",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = StoreError;

    /// Accepts `not_started`, `Not Started`, `not-started`, `NOT STARTED`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        match key.as_str() {
            "not_started" => Ok(Self::NotStarted),
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: i64,
    pub job_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrder {
    pub id: i64,
    pub work_order_number: String,
    pub job_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub id: i64,
    pub work_order_id: i64,
    pub operation_number: i64,
    pub work_center: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub planned_hours: f64,
    pub actual_hours: f64,
    pub status: OperationStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn remaining_work(&self) -> f64 {
        remaining_work(self.planned_hours, self.actual_hours)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
}

/// The hierarchy a row resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciled {
    pub job: Job,
    pub work_order: WorkOrder,
    pub operation: Operation,
    pub outcome: Outcome,
}

/// A row whose writes were rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub source_row: usize,
    pub message: String,
    pub raw: BTreeMap<String, String>,
}

/// Batch summary: what was written, skipped and rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub rows_read: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: Vec<SkipReport>,
    pub errors: Vec<RowFailure>,
}

impl IngestReport {
    /// Rows that reached the store.
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.errors.is_empty()
    }

    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        count_reasons(&self.skipped)
    }
}

pub(crate) fn count_reasons(skipped: &[SkipReport]) -> BTreeMap<SkipReason, usize> {
    let mut counts = BTreeMap::new();
    for s in skipped {
        *counts.entry(s.reason).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Anything carrying hours for a work center. Implemented by persisted
/// operations and by freshly normalized rows.
pub trait WorkItem {
    fn work_center(&self) -> &str;
    fn planned_hours(&self) -> f64;
    fn actual_hours(&self) -> f64;
    /// `None` when the item has no workflow state yet.
    fn status(&self) -> Option<OperationStatus>;

    fn remaining_work(&self) -> f64 {
        remaining_work(self.planned_hours(), self.actual_hours())
    }
}

impl<T: WorkItem> WorkItem for &T {
    fn work_center(&self) -> &str {
        (*self).work_center()
    }
    fn planned_hours(&self) -> f64 {
        (*self).planned_hours()
    }
    fn actual_hours(&self) -> f64 {
        (*self).actual_hours()
    }
    fn status(&self) -> Option<OperationStatus> {
        (*self).status()
    }
}

impl WorkItem for Operation {
    fn work_center(&self) -> &str {
        &self.work_center
    }
    fn planned_hours(&self) -> f64 {
        self.planned_hours
    }
    fn actual_hours(&self) -> f64 {
        self.actual_hours
    }
    fn status(&self) -> Option<OperationStatus> {
        Some(self.status)
    }
}

impl WorkItem for NormalizedRow {
    fn work_center(&self) -> &str {
        &self.work_center
    }
    fn planned_hours(&self) -> f64 {
        self.planned_hours
    }
    fn actual_hours(&self) -> f64 {
        self.actual_hours
    }
    fn status(&self) -> Option<OperationStatus> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkCenterSummary {
    pub work_center: String,
    pub job_count: usize,
    pub planned_hours: f64,
    pub actual_hours: f64,
    /// Sum of per-item remaining work.
    pub backlog_hours: f64,
    pub urgency: Urgency,
    /// Items with status Ready.
    pub available_work: usize,
    /// Items with status NotStarted.
    pub backlog_count: usize,
    /// Actual over planned, as a whole percentage.
    pub efficiency: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkCenterForecast {
    pub work_center: String,
    pub planned: f64,
    pub actual: f64,
    pub remaining: f64,
    pub forecasted: f64,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderListing {
    pub work_order_number: String,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListing {
    pub job_number: String,
    pub created_at: DateTime<Utc>,
    pub work_orders: Vec<WorkOrderListing>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEvent {
    pub id: i64,
    pub title: String,
    pub start: NaiveDate,
    pub work_center: String,
}
