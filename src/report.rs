//! Snapshot reporter: shapes the KPI report and audit into tables and chart
//! specifications. Writing them out is the job of [`crate::output`] and
//! [`crate::viz`].

use serde::Serialize;

use crate::audit::AuditSummary;
use crate::kpi::{KpiReport, Rate};
use crate::model::ChurnStatus;

/// A rectangular table of pre-formatted cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// File stem for the written artifact
    pub name: String,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &str, title: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// One bar: `None` marks a category without data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub category: String,
    pub value: Option<f64>,
}

/// Category-vs-value bar chart, fully computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
    pub y_max: f64,
}

/// Everything a run hands to the output sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub kpis: KpiReport,
    pub audit: AuditSummary,
    pub tables: Vec<Table>,
    pub charts: Vec<ChartSpec>,
}

impl Snapshot {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn chart(&self, name: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.name == name)
    }
}

/// Rates in tables are rounded to three decimals
fn format_rate(rate: Rate) -> String {
    rate.to_string()
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "no data".to_string(), |v| format!("{:.3}", v))
}

/// Build the rendering-ready snapshot
///
/// # Arguments
/// * `kpis` - Aggregated KPI report
/// * `audit` - Data-quality audit for the same run
///
/// # Returns
/// * The snapshot owning both inputs plus its tables and charts
pub fn build_snapshot(kpis: KpiReport, audit: AuditSummary) -> Snapshot {
    let tables = vec![
        overall_table(&kpis, &audit),
        payment_table(&kpis),
        crosstab_table(&kpis),
        plan_tier_table(&kpis),
        data_quality_table(&audit),
        rejected_rows_table(&audit),
    ];
    let charts = vec![churn_rate_chart(&kpis), users_chart(&kpis)];

    Snapshot {
        kpis,
        audit,
        tables,
        charts,
    }
}

fn overall_table(kpis: &KpiReport, audit: &AuditSummary) -> Table {
    let mut table = Table::new("overall_kpis", "Overall KPIs", &["metric", "value"]);
    let mut add = |metric: &str, value: String| table.push(vec![metric.to_string(), value]);

    add("rows_read", audit.total_rows.to_string());
    add("rows_rejected", audit.rejected.to_string());
    add("customers", kpis.total_records.to_string());
    add("churned", kpis.churned.to_string());
    add("retained", kpis.retained.to_string());
    add("churn_rate", format_rate(kpis.overall_churn_rate));
    add("delayed_relative_risk", format_optional(kpis.delayed_relative_risk));
    for profile in &kpis.status_profiles {
        let prefix = profile.churn.label().to_lowercase();
        add(
            &format!("{}_mean_tenure_months", prefix),
            format_optional(profile.mean_tenure_months),
        );
        for (metric, mean) in &profile.mean_engagement {
            add(&format!("{}_mean_{}", prefix, metric), format!("{:.3}", mean));
        }
    }
    for warning in &kpis.warnings {
        add("warning", warning.to_string());
    }

    table
}

fn payment_table(kpis: &KpiReport) -> Table {
    let mut table = Table::new(
        "churn_by_payment",
        "Churn rate by payment status",
        &["payment_status", "users", "churned", "churn_rate"],
    );
    for segment in &kpis.by_payment {
        table.push(vec![
            segment.segment.label().to_string(),
            segment.users.to_string(),
            segment.churned.to_string(),
            format_rate(segment.churn_rate),
        ]);
    }
    table
}

fn crosstab_table(kpis: &KpiReport) -> Table {
    let segments: Vec<_> = kpis.by_payment.iter().map(|s| s.segment).collect();

    let mut columns = vec!["churn_status"];
    columns.extend(segments.iter().map(|s| s.label()));
    columns.push("total");
    let mut table = Table::new("churn_crosstab", "Churn status by payment status", &columns);

    for churn in ChurnStatus::ALL {
        let counts: Vec<usize> = segments
            .iter()
            .map(|&payment| kpis.crosstab_count(churn, payment))
            .collect();
        let mut row = vec![churn.label().to_string()];
        row.extend(counts.iter().map(usize::to_string));
        row.push(counts.iter().sum::<usize>().to_string());
        table.push(row);
    }

    let mut totals = vec!["Total".to_string()];
    totals.extend(kpis.by_payment.iter().map(|s| s.users.to_string()));
    totals.push(kpis.total_records.to_string());
    table.push(totals);

    table
}

fn plan_tier_table(kpis: &KpiReport) -> Table {
    let mut table = Table::new(
        "churn_by_plan_tier",
        "Churn rate by plan tier",
        &["plan_tier", "users", "churned", "churn_rate"],
    );
    for tier in &kpis.by_plan_tier {
        table.push(vec![
            tier.plan_tier.clone(),
            tier.users.to_string(),
            tier.churned.to_string(),
            format_rate(tier.churn_rate),
        ]);
    }
    table
}

fn data_quality_table(audit: &AuditSummary) -> Table {
    let mut table = Table::new("data_quality", "Data quality", &["check", "rows"]);
    table.push(vec!["rows_read".to_string(), audit.total_rows.to_string()]);
    table.push(vec!["rows_cleaned".to_string(), audit.cleaned.to_string()]);
    for (reason, count) in &audit.rejections_by_reason {
        table.push(vec![reason.code().to_string(), count.to_string()]);
    }
    table.push(vec![
        format!("imputed_unknown_payment ({})", audit.missing_payment_policy),
        audit.imputed_payment.to_string(),
    ]);
    table
}

fn rejected_rows_table(audit: &AuditSummary) -> Table {
    let mut table = Table::new(
        "rejected_rows",
        "Rejected rows",
        &["line", "customer_id", "reason", "detail"],
    );
    for rejection in &audit.rejections {
        table.push(vec![
            rejection.line.to_string(),
            rejection.customer_id.clone().unwrap_or_default(),
            rejection.reason.code().to_string(),
            rejection.error.to_string(),
        ]);
    }
    table
}

fn churn_rate_chart(kpis: &KpiReport) -> ChartSpec {
    ChartSpec {
        name: "churn_by_payment".to_string(),
        title: "Churn rate by payment status".to_string(),
        x_label: "Payment status".to_string(),
        y_label: "Churn rate".to_string(),
        bars: kpis
            .by_payment
            .iter()
            .map(|s| Bar {
                category: s.segment.label().to_string(),
                value: s.churn_rate.value(),
            })
            .collect(),
        y_max: 1.0,
    }
}

fn users_chart(kpis: &KpiReport) -> ChartSpec {
    let max_users = kpis.by_payment.iter().map(|s| s.users).max().unwrap_or(0);
    ChartSpec {
        name: "users_by_payment".to_string(),
        title: "Customers by payment status".to_string(),
        x_label: "Payment status".to_string(),
        y_label: "Customers".to_string(),
        bars: kpis
            .by_payment
            .iter()
            .map(|s| Bar {
                category: s.segment.label().to_string(),
                value: Some(s.users as f64),
            })
            .collect(),
        y_max: (max_users as f64 * 1.1).max(1.0),
    }
}

/// Print the snapshot preview to the console
pub fn print_snapshot_summary(snapshot: &Snapshot) {
    let kpis = &snapshot.kpis;
    let audit = &snapshot.audit;

    println!("\n=== Churn Risk Snapshot ===");
    println!("Rows read: {}", audit.total_rows);
    println!(
        "Rows rejected: {} (payment policy: {}, imputed Unknown: {})",
        audit.rejected, audit.missing_payment_policy, audit.imputed_payment
    );
    for (reason, count) in &audit.rejections_by_reason {
        println!("  {:<24} {}", reason.code(), count);
    }

    println!("\nCustomers analysed: {}", kpis.total_records);
    println!("Overall churn rate: {}", kpis.overall_churn_rate);
    for warning in &kpis.warnings {
        println!("Warning: {}", warning);
    }

    println!("\n  Payment  |  Users  | Churned | Churn rate");
    println!("  ---------|---------|---------|-----------");
    for segment in &kpis.by_payment {
        println!(
            "  {:8} | {:7} | {:7} | {:>10}",
            segment.segment.label(),
            segment.users,
            segment.churned,
            segment.churn_rate.to_string()
        );
    }

    if let Some(risk) = kpis.delayed_relative_risk {
        println!("\nDelayed payers churn {:.2}x as often as on-time payers", risk);
    }
}
