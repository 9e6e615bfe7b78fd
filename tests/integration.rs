//! Integration tests for churnsnap

use churnsnap::{
    load_raw_table, run_snapshot, write_snapshot, ColumnNames, MissingPaymentPolicy,
    ChartFormat, PaymentSegment, Rate, RejectReason, SnapshotConfig, SnapshotError,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file in the shape of the raw subscription export
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Customer ID,Churn Status (Yes/No),Payment History (On-Time/Delayed),Plan Tier,Tenure Months,Logins Per Month"
    )
    .unwrap();

    writeln!(file, "1,Yes,On-Time,Basic,3,2").unwrap();
    writeln!(file, "2,No,Delayed,Premium,24,15").unwrap();
    writeln!(file, "3,Yes,Delayed,basic,5,1").unwrap();
    // Missing payment behavior
    writeln!(file, "4,No,,Premium,12,9").unwrap();
    // Duplicate of customer 1
    writeln!(file, "1,No,On-Time,Basic,30,20").unwrap();
    // Tenure is not a number
    writeln!(file, "5,No,On-Time,Basic,ten,4").unwrap();
    // Negative tenure
    writeln!(file, "6,Yes,Delayed,Basic,-2,4").unwrap();
    // Unrecognised churn value
    writeln!(file, "7,Maybe,On-Time,Basic,8,4").unwrap();
    // Missing customer id
    writeln!(file, ",Yes,Delayed,Basic,8,4").unwrap();

    file
}

fn config_for(file: &NamedTempFile) -> SnapshotConfig {
    SnapshotConfig {
        input: file.path().to_path_buf(),
        columns: ColumnNames {
            engagement: vec!["logins_per_month".to_string()],
            ..ColumnNames::default()
        },
        ..SnapshotConfig::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let config = config_for(&test_file);

    let table = load_raw_table(&config.input).unwrap();
    assert_eq!(table.len(), 9);

    let snapshot = run_snapshot(&table, &config).unwrap();
    let kpis = &snapshot.kpis;
    let audit = &snapshot.audit;

    // Every raw row is accounted for
    assert_eq!(audit.total_rows, 9);
    assert_eq!(audit.cleaned + audit.rejected, audit.total_rows);
    assert_eq!(audit.accepted, 6);
    assert_eq!(kpis.total_records, 4);

    assert_eq!(audit.count(RejectReason::DuplicateIdentifier), 1);
    assert_eq!(audit.count(RejectReason::TypeMismatch), 1);
    assert_eq!(audit.count(RejectReason::MissingColumn), 1);
    assert_eq!(audit.count(RejectReason::InvalidNumericValue), 1);
    assert_eq!(audit.count(RejectReason::UnmappedChurnStatus), 1);
    assert_eq!(audit.imputed_payment, 1);

    // The duplicate row is the rejected one; the first occurrence counts
    let duplicate = audit
        .rejections
        .iter()
        .find(|r| r.reason == RejectReason::DuplicateIdentifier)
        .unwrap();
    assert_eq!(duplicate.line, 6);
    assert_eq!(duplicate.customer_id.as_deref(), Some("1"));

    assert_eq!(kpis.overall_churn_rate, Rate::Value(0.5));
    let on_time = kpis.segment(PaymentSegment::OnTime).unwrap();
    assert_eq!((on_time.users, on_time.churned), (1, 1));
    let delayed = kpis.segment(PaymentSegment::Delayed).unwrap();
    assert_eq!(delayed.churn_rate, Rate::Value(0.5));
    let unknown = kpis.segment(PaymentSegment::Unknown).unwrap();
    assert_eq!((unknown.users, unknown.churned), (1, 0));

    let crosstab_total: usize = kpis.crosstab.iter().map(|c| c.count).sum();
    assert_eq!(crosstab_total, kpis.total_records);

    let tiers: Vec<&str> = kpis.by_plan_tier.iter().map(|t| t.plan_tier.as_str()).collect();
    assert_eq!(tiers, vec!["basic", "premium"]);
}

#[test]
fn test_drop_policy() {
    let test_file = create_test_csv();
    let config = SnapshotConfig {
        missing_payment_policy: MissingPaymentPolicy::Drop,
        ..config_for(&test_file)
    };

    let table = load_raw_table(&config.input).unwrap();
    let snapshot = run_snapshot(&table, &config).unwrap();

    assert_eq!(snapshot.kpis.total_records, 3);
    assert!(snapshot.kpis.segment(PaymentSegment::Unknown).is_none());
    assert_eq!(snapshot.audit.count(RejectReason::MissingPaymentBehavior), 1);
    assert_eq!(snapshot.audit.imputed_payment, 0);
    assert!(snapshot.audit.is_balanced());
}

#[test]
fn test_reference_scenario_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,churn_status_yesno,payment_history_ontimedelayed").unwrap();
    writeln!(file, "1,Yes,On-Time").unwrap();
    writeln!(file, "2,No,Delayed").unwrap();
    writeln!(file, "3,Yes,Delayed").unwrap();

    let table = load_raw_table(file.path()).unwrap();
    let snapshot = run_snapshot(&table, &SnapshotConfig::default()).unwrap();

    let overall = snapshot.kpis.overall_churn_rate.value().unwrap();
    assert!((overall - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(
        snapshot.kpis.segment(PaymentSegment::OnTime).unwrap().churn_rate,
        Rate::Value(1.0)
    );
    assert_eq!(
        snapshot.kpis.segment(PaymentSegment::Delayed).unwrap().churn_rate,
        Rate::Value(0.5)
    );
}

#[test]
fn test_header_only_file_is_empty_snapshot() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,churn_status_yesno,payment_history_ontimedelayed").unwrap();

    let table = load_raw_table(file.path()).unwrap();
    let snapshot = run_snapshot(&table, &SnapshotConfig::default()).unwrap();

    assert_eq!(snapshot.kpis.overall_churn_rate, Rate::NoData);
    assert!(!snapshot.kpis.warnings.is_empty());
    assert!(snapshot
        .kpis
        .by_payment
        .iter()
        .all(|s| s.churn_rate == Rate::NoData));
}

#[test]
fn test_missing_required_column_is_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,plan_tier").unwrap();
    writeln!(file, "1,basic").unwrap();

    let table = load_raw_table(file.path()).unwrap();
    let err = run_snapshot(&table, &SnapshotConfig::default()).unwrap_err();

    match err.downcast_ref::<SnapshotError>() {
        Some(SnapshotError::SchemaUnrecoverable { missing }) => {
            assert_eq!(
                missing,
                &vec![
                    "churn_status_yesno".to_string(),
                    "payment_history_ontimedelayed".to_string()
                ]
            );
        }
        other => panic!("expected SchemaUnrecoverable, got {:?}", other),
    }
}

#[test]
fn test_written_artifacts() {
    let test_file = create_test_csv();
    let output_dir = tempdir().unwrap();
    let config = SnapshotConfig {
        output_dir: output_dir.path().join("snapshot"),
        ..config_for(&test_file)
    };

    let table = load_raw_table(&config.input).unwrap();
    let snapshot = run_snapshot(&table, &config).unwrap();
    let written = write_snapshot(&snapshot, &config.output_dir, Some(ChartFormat::Svg)).unwrap();

    for name in [
        "overall_kpis.csv",
        "churn_by_payment.csv",
        "churn_crosstab.csv",
        "churn_by_plan_tier.csv",
        "data_quality.csv",
        "rejected_rows.csv",
        "snapshot.json",
        "churn_by_payment.svg",
        "users_by_payment.svg",
    ] {
        let path = config.output_dir.join(name);
        assert!(path.exists(), "{} not written", name);
        assert!(written.contains(&path));
    }

    let rejected = std::fs::read_to_string(config.output_dir.join("rejected_rows.csv")).unwrap();
    // Header plus one line per rejection
    assert_eq!(rejected.lines().count(), 1 + snapshot.audit.rejected);

    let quality = std::fs::read_to_string(config.output_dir.join("data_quality.csv")).unwrap();
    assert!(quality.contains("DuplicateIdentifier,1"));
}

#[test]
fn test_png_charts_for_empty_snapshot() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,churn_status_yesno,payment_history_ontimedelayed").unwrap();
    let output_dir = tempdir().unwrap();

    let table = load_raw_table(file.path()).unwrap();
    let snapshot = run_snapshot(&table, &SnapshotConfig::default()).unwrap();
    write_snapshot(&snapshot, output_dir.path(), Some(ChartFormat::Png)).unwrap();

    assert!(output_dir.path().join("churn_by_payment.png").exists());
    assert!(output_dir.path().join("users_by_payment.png").exists());
}

#[test]
fn test_configured_synonyms_keep_builtin_spellings() {
    let test_file = create_test_csv();
    let mut config = config_for(&test_file);
    config.synonyms = SnapshotConfig::from_toml_str("[synonyms]\nchurned = [\"maybe\"]")
        .unwrap()
        .synonyms;

    let table = load_raw_table(&config.input).unwrap();
    let snapshot = run_snapshot(&table, &config).unwrap();

    // "Maybe" now maps to churned; "Yes"/"No" still resolve
    assert_eq!(snapshot.audit.count(RejectReason::UnmappedChurnStatus), 0);
    assert_eq!(snapshot.kpis.total_records, 5);
    assert_eq!(snapshot.kpis.churned, 3);
}

#[test]
fn test_snapshot_is_deterministic() {
    let test_file = create_test_csv();
    let config = config_for(&test_file);

    let table = load_raw_table(&config.input).unwrap();
    let first = run_snapshot(&table, &config).unwrap();
    let second = run_snapshot(&table, &config).unwrap();

    assert_eq!(first.tables, second.tables);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
