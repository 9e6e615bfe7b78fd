//! churnsnap entrypoint: load, validate, clean, aggregate, report.

use anyhow::{Context, Result};
use clap::Parser;
use churnsnap::{load_raw_table, report, run_snapshot, write_snapshot, Args};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = args.resolve_config()?;

    if args.verbose {
        println!("churnsnap - Churn Risk Snapshot");
        println!("===============================\n");
        println!("  Input file: {}", config.input.display());
        println!("  Output directory: {}", config.output_dir.display());
        println!("  Missing payment policy: {}", config.missing_payment_policy);
    }

    let start_time = Instant::now();

    // Step 1: Load the export; a missing or unreadable file is fatal
    let table = load_raw_table(&config.input)
        .with_context(|| format!("Failed to load {}", config.input.display()))?;
    println!("✓ Data loaded: {} rows", table.len());

    // Step 2: Validate, clean and aggregate
    let snapshot = run_snapshot(&table, &config)?;
    println!(
        "✓ Snapshot computed: {} customers, {} rows rejected",
        snapshot.kpis.total_records, snapshot.audit.rejected
    );

    // Step 3: Write artifacts
    let written = write_snapshot(&snapshot, &config.output_dir, args.chart_output(&config))?;

    report::print_snapshot_summary(&snapshot);

    println!("\nSaved outputs:");
    for path in &written {
        println!("- {}", path.display());
    }
    if args.verbose {
        println!(
            "\nTotal processing time: {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
