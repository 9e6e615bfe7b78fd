//! Snapshot configuration: defaults, optional TOML file, validation

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::clean::{CleaningPolicy, MissingPaymentPolicy, SynonymTable};
use crate::error::SnapshotError;

/// Image format for rendered charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChartFormat {
    #[default]
    Png,
    Svg,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Png => "png",
            ChartFormat::Svg => "svg",
        }
    }
}

/// Source column names, after header standardisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub customer_id: String,
    pub churn_status: String,
    pub payment_behavior: String,
    /// Optional in the source; skipped when the header lacks it
    pub plan_tier: String,
    /// Optional in the source; skipped when the header lacks it
    pub tenure_months: String,
    /// Numeric engagement metrics, all optional. Defaults to
    /// `logins_per_month`; set `engagement = []` to ignore them.
    pub engagement: Vec<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            customer_id: "customer_id".to_string(),
            churn_status: "churn_status_yesno".to_string(),
            payment_behavior: "payment_history_ontimedelayed".to_string(),
            plan_tier: "plan_tier".to_string(),
            tenure_months: "tenure_months".to_string(),
            engagement: vec!["logins_per_month".to_string()],
        }
    }
}

impl ColumnNames {
    fn all(&self) -> impl Iterator<Item = &str> {
        [
            self.customer_id.as_str(),
            self.churn_status.as_str(),
            self.payment_behavior.as_str(),
            self.plan_tier.as_str(),
            self.tenure_months.as_str(),
        ]
        .into_iter()
        .chain(self.engagement.iter().map(String::as_str))
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = HashSet::new();
        for name in self.all() {
            if name.trim().is_empty() {
                return Err(SnapshotError::InvalidSchema(
                    "column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name) {
                return Err(SnapshotError::InvalidSchema(format!(
                    "column '{}' is mapped more than once",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Everything a snapshot run needs. Fixed for the duration of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub missing_payment_policy: MissingPaymentPolicy,
    pub chart_format: ChartFormat,
    pub columns: ColumnNames,
    pub synonyms: SynonymTable,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/users.csv"),
            output_dir: PathBuf::from("outputs"),
            missing_payment_policy: MissingPaymentPolicy::default(),
            chart_format: ChartFormat::default(),
            columns: ColumnNames::default(),
            synonyms: SynonymTable::default(),
        }
    }
}

impl SnapshotConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let config: SnapshotConfig =
            toml::from_str(contents).context("Invalid snapshot configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file {}", path.display()))
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.columns.validate()?;
        self.synonyms.validate()?;
        Ok(())
    }

    pub fn cleaning_policy(&self) -> CleaningPolicy {
        CleaningPolicy::new(self.missing_payment_policy, &self.synonyms)
            .with_tenure_column(&self.columns.tenure_months)
    }
}
