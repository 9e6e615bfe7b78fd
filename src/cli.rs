//! Command-line interface definitions and config resolution

use clap::Parser;
use std::path::PathBuf;

use crate::clean::MissingPaymentPolicy;
use crate::config::{ChartFormat, SnapshotConfig};

/// Churn risk snapshot: validate a customer export and report churn by payment behavior
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file [default: data/users.csv]
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for tables, charts and snapshot.json [default: outputs]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// How to treat rows with missing payment behavior [default: impute_unknown]
    #[arg(long, value_enum)]
    pub missing_payment_policy: Option<MissingPaymentPolicy>,

    /// Image format for charts [default: png]
    #[arg(long, value_enum)]
    pub chart_format: Option<ChartFormat>,

    /// TOML config file; command-line flags take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Merge defaults, the optional config file and command-line flags
    pub fn resolve_config(&self) -> crate::Result<SnapshotConfig> {
        let mut config = match &self.config {
            Some(path) => SnapshotConfig::from_file(path)?,
            None => SnapshotConfig::default(),
        };

        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(policy) = self.missing_payment_policy {
            config.missing_payment_policy = policy;
        }
        if let Some(format) = self.chart_format {
            config.chart_format = format;
        }

        Ok(config)
    }

    /// Chart format to render, or `None` with `--no-charts`
    pub fn chart_output(&self, config: &SnapshotConfig) -> Option<ChartFormat> {
        (!self.no_charts).then_some(config.chart_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["churnsnap"]).unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(config, SnapshotConfig::default());
        assert_eq!(args.chart_output(&config), Some(ChartFormat::Png));
    }

    #[test]
    fn test_parse_policy_values() {
        let args =
            Args::try_parse_from(["churnsnap", "--missing-payment-policy", "drop"]).unwrap();
        assert_eq!(args.missing_payment_policy, Some(MissingPaymentPolicy::Drop));

        let args = Args::try_parse_from(["churnsnap", "--missing-payment-policy", "impute_unknown"])
            .unwrap();
        assert_eq!(
            args.missing_payment_policy,
            Some(MissingPaymentPolicy::ImputeUnknown)
        );

        assert!(Args::try_parse_from(["churnsnap", "--missing-payment-policy", "merge"]).is_err());
        assert!(Args::try_parse_from(["churnsnap", "--chart-format", "gif"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "output_dir = \"from_file\"").unwrap();
        writeln!(file, "missing_payment_policy = \"drop\"").unwrap();
        writeln!(file, "chart_format = \"svg\"").unwrap();

        let path = file.path().to_str().unwrap();
        let args = Args::try_parse_from([
            "churnsnap",
            "--config",
            path,
            "--chart-format",
            "png",
            "--no-charts",
        ])
        .unwrap();
        let config = args.resolve_config().unwrap();

        assert_eq!(config.output_dir, PathBuf::from("from_file"));
        assert_eq!(config.missing_payment_policy, MissingPaymentPolicy::Drop);
        assert_eq!(config.chart_format, ChartFormat::Png);
        assert_eq!(args.chart_output(&config), None);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args = Args::try_parse_from(["churnsnap", "--config", "/nonexistent/snapshot.toml"])
            .unwrap();
        assert!(args.resolve_config().is_err());
    }
}
