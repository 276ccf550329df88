//! `shopflow-ingest`: work-order ingestion and work-center metrics.
//!
//! Turns spreadsheet extracts of job/operation records into a normalized
//! Job → WorkOrder → Operation hierarchy, and derives backlog, urgency,
//! efficiency and forecasts per work center. No CLI or file-format code.

pub mod aggregate;
pub mod columns;
pub mod config;
pub mod error;
pub mod forecast;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod store;

pub use aggregate::aggregate;
pub use columns::{resolve, AliasTable, Field, ResolvedColumns};
pub use config::ShopConfig;
pub use error::{IngestError, StoreError};
pub use forecast::{forecast, forecast_report};
pub use model::{
    IngestReport, NormalizedRow, Operation, OperationStatus, RawRow, RawValue, Table, Urgency,
    WorkCenterForecast, WorkCenterSummary, WorkItem,
};
pub use normalize::{normalize_batch, NormalizedBatch};
pub use reconcile::reconcile;
pub use store::Store;
