//! End-to-end snapshot pipeline:
//! raw rows → validated → cleaned → aggregated → snapshot.

use crate::audit::AuditSummary;
use crate::clean::{clean_records, CleaningPolicy};
use crate::config::SnapshotConfig;
use crate::data::RawTable;
use crate::kpi::aggregate;
use crate::report::{build_snapshot, Snapshot};
use crate::schema::{partition_outcomes, Schema};

/// Run every stage over an already-loaded table
///
/// # Arguments
/// * `table` - Raw rows with standardised headers
/// * `schema` - Expected columns; bound against `table.headers` first
/// * `policy` - Cleaning rules for the run
///
/// # Returns
/// * The snapshot, or `SchemaUnrecoverable` when required columns are absent.
///   Row-level problems never fail the run.
pub fn run_pipeline(
    table: &RawTable,
    schema: &Schema,
    policy: &CleaningPolicy,
) -> crate::Result<Snapshot> {
    let schema = schema.bind(&table.headers)?;

    let outcomes = schema.validate(&table.rows);
    let (accepted, mut rejections) = partition_outcomes(outcomes);
    tracing::info!(
        accepted = accepted.len(),
        rejected = rejections.len(),
        "validation complete"
    );

    let cleaning = clean_records(&accepted, policy);
    tracing::info!(
        cleaned = cleaning.records.len(),
        rejected = cleaning.rejected.len(),
        imputed_payment = cleaning.imputed_payment,
        "cleaning complete"
    );

    let kpis = aggregate(&cleaning.records, policy.missing_payment());

    rejections.extend(cleaning.rejected);
    let audit = AuditSummary::new(
        table.len(),
        accepted.len(),
        cleaning.records.len(),
        cleaning.imputed_payment,
        policy.missing_payment(),
        rejections,
    );
    audit.log();

    Ok(build_snapshot(kpis, audit))
}

/// Run the pipeline with the schema and policy described by `config`
pub fn run_snapshot(table: &RawTable, config: &SnapshotConfig) -> crate::Result<Snapshot> {
    let schema = Schema::from_columns(&config.columns)?;
    let policy = config.cleaning_policy();
    run_pipeline(table, &schema, &policy)
}
