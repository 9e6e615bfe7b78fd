//! Artifact writers: CSV tables via Polars, JSON snapshot via serde_json and
//! charts via [`crate::viz`].

use anyhow::Context;
use polars::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::ChartFormat;
use crate::report::{Snapshot, Table};
use crate::viz::render_chart;

/// File name of the machine-readable snapshot
pub const SNAPSHOT_JSON: &str = "snapshot.json";

/// Convert a report table into an all-string DataFrame
pub fn table_to_dataframe(table: &Table) -> crate::Result<DataFrame> {
    let series: Vec<Series> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<&str> = table
                .rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect();
            Series::new(name, values)
        })
        .collect();

    Ok(DataFrame::new(series)?)
}

/// Write every table as `<name>.csv` into `output_dir`
pub fn write_tables(snapshot: &Snapshot, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(snapshot.tables.len());

    for table in &snapshot.tables {
        let path = output_dir.join(format!("{}.csv", table.name));
        let mut df = table_to_dataframe(table)?;
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

/// Write the full snapshot as pretty JSON
pub fn write_json(snapshot: &Snapshot, output_dir: &Path) -> crate::Result<PathBuf> {
    let path = output_dir.join(SNAPSHOT_JSON);
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Render every chart as `<name>.<ext>`
pub fn write_charts(
    snapshot: &Snapshot,
    output_dir: &Path,
    format: ChartFormat,
) -> crate::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(snapshot.charts.len());
    for chart in &snapshot.charts {
        let path = output_dir.join(format!("{}.{}", chart.name, format.extension()));
        render_chart(chart, &path, format)
            .with_context(|| format!("Failed to render {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Write all artifacts of a snapshot, creating `output_dir` if needed
///
/// # Arguments
/// * `snapshot` - Snapshot to persist
/// * `output_dir` - Destination directory
/// * `chart_format` - Image format, or `None` to skip charts
///
/// # Returns
/// * Paths of every file written
pub fn write_snapshot(
    snapshot: &Snapshot,
    output_dir: &Path,
    chart_format: Option<ChartFormat>,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let mut written = write_tables(snapshot, output_dir)?;
    written.push(write_json(snapshot, output_dir)?);
    if let Some(format) = chart_format {
        written.extend(write_charts(snapshot, output_dir, format)?);
    }

    tracing::info!(files = written.len(), "artifacts written to {}", output_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSummary;
    use crate::clean::MissingPaymentPolicy;
    use crate::kpi::aggregate;
    use crate::model::{ChurnStatus, CleanedRecord, PaymentSegment};
    use crate::report::build_snapshot;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn test_snapshot() -> Snapshot {
        let records: Vec<CleanedRecord> = [
            ("1", ChurnStatus::Churned, PaymentSegment::OnTime),
            ("2", ChurnStatus::Retained, PaymentSegment::Delayed),
            ("3", ChurnStatus::Churned, PaymentSegment::Delayed),
        ]
        .iter()
        .map(|&(id, churn, payment)| CleanedRecord {
            line: 2,
            customer_id: id.to_string(),
            churn,
            payment,
            plan_tier: None,
            tenure_months: None,
            engagement: BTreeMap::new(),
        })
        .collect();

        let policy = MissingPaymentPolicy::ImputeUnknown;
        let audit = AuditSummary::new(3, 3, 3, 0, policy, Vec::new());
        build_snapshot(aggregate(&records, policy), audit)
    }

    #[test]
    fn test_table_to_dataframe() {
        let snapshot = test_snapshot();
        let table = snapshot.table("churn_by_payment").unwrap();
        let df = table_to_dataframe(table).unwrap();
        assert_eq!(df.shape(), (3, 4));
    }

    #[test]
    fn test_write_snapshot_without_charts() {
        let snapshot = test_snapshot();
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("outputs");

        let written = write_snapshot(&snapshot, &output_dir, None).unwrap();
        assert_eq!(written.len(), snapshot.tables.len() + 1);
        assert!(written.iter().all(|p| p.exists()));

        let csv = std::fs::read_to_string(output_dir.join("churn_by_payment.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("payment_status,users,churned,churn_rate"));
        assert_eq!(lines.next(), Some("OnTime,1,1,1.000"));
        assert_eq!(lines.next(), Some("Delayed,2,1,0.500"));
        assert_eq!(lines.next(), Some("Unknown,0,0,no data"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output_dir.join(SNAPSHOT_JSON)).unwrap())
                .unwrap();
        assert_eq!(json["kpis"]["total_records"], 3);
        assert_eq!(json["kpis"]["by_payment"][2]["churn_rate"]["status"], "no_data");
        assert_eq!(json["audit"]["rejected"], 0);
    }
}
