//! churnsnap: a reproducible churn risk snapshot from a customer export
//!
//! The pipeline validates raw rows against an explicit schema, cleans them
//! under a named missing-value policy, aggregates churn KPIs segmented by
//! payment behavior, and shapes the result into tables and charts.

pub mod audit;
pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod kpi;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod viz;

// Re-export public items for easier access
pub use audit::AuditSummary;
pub use clean::{clean_record, clean_records, CleaningPolicy, MissingPaymentPolicy, SynonymTable};
pub use cli::Args;
pub use config::{ChartFormat, ColumnNames, SnapshotConfig};
pub use data::{load_raw_table, RawRow, RawTable};
pub use error::{RejectReason, ReportWarning, RowError, SnapshotError};
pub use kpi::{aggregate, KpiReport, Rate};
pub use model::{ChurnStatus, CleanedRecord, CustomerRecord, PaymentSegment};
pub use output::write_snapshot;
pub use pipeline::{run_pipeline, run_snapshot};
pub use report::{build_snapshot, Snapshot};
pub use schema::{Schema, ValidationOutcome};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
