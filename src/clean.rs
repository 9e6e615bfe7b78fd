//! Data cleaning: categorical normalisation, missing-value policy and
//! numeric range checks.
//!
//! Cleaning is a pure function of `(record, policy)`. A record either comes
//! out fully resolved or is rejected through the same [`Rejection`] channel
//! the schema validator uses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{RowError, SnapshotError};
use crate::model::{ChurnStatus, CleanedRecord, CustomerRecord, PaymentSegment};
use crate::schema::{RejectedRow, Rejection};

/// What to do with a record whose payment behavior is missing or unmapped
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MissingPaymentPolicy {
    /// Reject the row
    Drop,
    /// Keep the row in its own `Unknown` segment
    #[default]
    #[value(name = "impute_unknown", alias = "impute-unknown")]
    ImputeUnknown,
}

impl MissingPaymentPolicy {
    /// Segments a report under this policy always lists, in canonical order
    pub fn segments(self) -> &'static [PaymentSegment] {
        match self {
            MissingPaymentPolicy::Drop => &[PaymentSegment::OnTime, PaymentSegment::Delayed],
            MissingPaymentPolicy::ImputeUnknown => &PaymentSegment::ALL,
        }
    }
}

impl fmt::Display for MissingPaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPaymentPolicy::Drop => f.write_str("drop"),
            MissingPaymentPolicy::ImputeUnknown => f.write_str("impute_unknown"),
        }
    }
}

/// Source spellings accepted for each canonical value.
///
/// Entries are compared after [`normalize_key`], so `"On-Time"`, `"on time"`
/// and `"ONTIME"` are the same key. A configured table adds to the built-in
/// spellings of [`SynonymTable::default`]; it never removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynonymTable {
    pub churned: Vec<String>,
    pub retained: Vec<String>,
    pub on_time: Vec<String>,
    pub delayed: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self {
            churned: words(&[
                "yes", "y", "true", "1", "churned", "churn", "lapsed", "cancelled", "canceled",
            ]),
            retained: words(&["no", "n", "false", "0", "retained", "active", "stayed"]),
            on_time: words(&["ontime", "punctual", "paid", "current", "regular"]),
            delayed: words(&["delayed", "late", "overdue", "pastdue", "delinquent"]),
        }
    }
}

impl SynonymTable {
    /// Built-in spellings followed by this table's own entries
    pub fn with_builtin(&self) -> SynonymTable {
        let builtin = SynonymTable::default();
        SynonymTable {
            churned: merge_synonyms(&builtin.churned, &self.churned),
            retained: merge_synonyms(&builtin.retained, &self.retained),
            on_time: merge_synonyms(&builtin.on_time, &self.on_time),
            delayed: merge_synonyms(&builtin.delayed, &self.delayed),
        }
    }

    /// Reject tables where one key resolves to two canonical values, once
    /// merged with the built-in spellings
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let merged = self.with_builtin();
        check_disjoint(&[
            (ChurnStatus::Churned.label(), &merged.churned),
            (ChurnStatus::Retained.label(), &merged.retained),
        ])?;
        check_disjoint(&[
            (PaymentSegment::OnTime.label(), &merged.on_time),
            (PaymentSegment::Delayed.label(), &merged.delayed),
        ])
    }
}

fn merge_synonyms(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged = base.to_vec();
    for synonym in extra {
        let key = normalize_key(synonym);
        if !merged.iter().any(|existing| normalize_key(existing) == key) {
            merged.push(synonym.clone());
        }
    }
    merged
}

fn check_disjoint(groups: &[(&'static str, &Vec<String>)]) -> Result<(), SnapshotError> {
    let mut seen: HashMap<String, &'static str> = HashMap::new();
    for &(label, synonyms) in groups {
        let keys = std::iter::once(normalize_key(label))
            .chain(synonyms.iter().map(|s| normalize_key(s)));
        for key in keys.filter(|k| !k.is_empty()) {
            match seen.get(&key) {
                Some(&first) if first != label => {
                    return Err(SnapshotError::ConflictingSynonym {
                        key,
                        first: first.to_string(),
                        second: label.to_string(),
                    });
                }
                _ => {
                    seen.insert(key, label);
                }
            }
        }
    }
    Ok(())
}

/// Trim, case-fold and keep only alphanumerics
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn normalize_tier(raw: &str) -> Option<String> {
    let tier = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (!tier.is_empty()).then_some(tier)
}

/// Resolved cleaning rules for one run
#[derive(Debug, Clone)]
pub struct CleaningPolicy {
    missing_payment: MissingPaymentPolicy,
    churn_lookup: HashMap<String, ChurnStatus>,
    payment_lookup: HashMap<String, PaymentSegment>,
    /// Source name of the tenure column, reported in range rejections
    tenure_column: String,
}

impl CleaningPolicy {
    /// Build lookups from a synonym table merged with the built-in spellings.
    /// Canonical labels always resolve to themselves, so cleaned output can be
    /// cleaned again unchanged.
    pub fn new(missing_payment: MissingPaymentPolicy, synonyms: &SynonymTable) -> Self {
        let synonyms = synonyms.with_builtin();
        let mut churn_lookup = HashMap::new();
        for (status, list) in [
            (ChurnStatus::Churned, &synonyms.churned),
            (ChurnStatus::Retained, &synonyms.retained),
        ] {
            churn_lookup.insert(normalize_key(status.label()), status);
            for synonym in list {
                churn_lookup.insert(normalize_key(synonym), status);
            }
        }

        let mut payment_lookup = HashMap::new();
        for (segment, list) in [
            (PaymentSegment::OnTime, &synonyms.on_time),
            (PaymentSegment::Delayed, &synonyms.delayed),
        ] {
            payment_lookup.insert(normalize_key(segment.label()), segment);
            for synonym in list {
                payment_lookup.insert(normalize_key(synonym), segment);
            }
        }

        Self {
            missing_payment,
            churn_lookup,
            payment_lookup,
            tenure_column: "tenure_months".to_string(),
        }
    }

    /// Use `column` as the tenure column name in rejection details
    pub fn with_tenure_column(mut self, column: impl Into<String>) -> Self {
        self.tenure_column = column.into();
        self
    }

    pub fn missing_payment(&self) -> MissingPaymentPolicy {
        self.missing_payment
    }

    pub fn resolve_churn(&self, raw: &str) -> Option<ChurnStatus> {
        self.churn_lookup.get(&normalize_key(raw)).copied()
    }

    pub fn resolve_payment(&self, raw: &str) -> Option<PaymentSegment> {
        self.payment_lookup.get(&normalize_key(raw)).copied()
    }
}

impl Default for CleaningPolicy {
    fn default() -> Self {
        Self::new(MissingPaymentPolicy::default(), &SynonymTable::default())
    }
}

fn check_numeric(column: &str, value: f64) -> Result<(), RowError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RowError::InvalidNumericValue {
            column: column.to_string(),
            value,
        })
    }
}

/// Clean a single record
///
/// # Arguments
/// * `record` - Record accepted by the schema validator
/// * `policy` - Synonym lookups and missing-payment policy
///
/// # Returns
/// * The cleaned record, or the reason it must be excluded
pub fn clean_record(
    record: &CustomerRecord,
    policy: &CleaningPolicy,
) -> Result<CleanedRecord, RowError> {
    if let Some(tenure) = record.tenure_months {
        check_numeric(&policy.tenure_column, tenure)?;
    }
    for (column, &value) in &record.engagement {
        check_numeric(column, value)?;
    }

    let churn = policy
        .resolve_churn(&record.churn_status)
        .ok_or_else(|| RowError::UnmappedChurnStatus {
            value: record.churn_status.clone(),
        })?;

    let resolved = record
        .payment_behavior
        .as_deref()
        .and_then(|raw| policy.resolve_payment(raw));
    let payment = match (resolved, policy.missing_payment()) {
        (Some(segment), _) => segment,
        (None, MissingPaymentPolicy::ImputeUnknown) => PaymentSegment::Unknown,
        (None, MissingPaymentPolicy::Drop) => {
            return Err(RowError::MissingPaymentBehavior {
                value: record.payment_behavior.clone().unwrap_or_default(),
            });
        }
    };

    Ok(CleanedRecord {
        line: record.line,
        customer_id: record.customer_id.clone(),
        churn,
        payment,
        plan_tier: record.plan_tier.as_deref().and_then(normalize_tier),
        tenure_months: record.tenure_months,
        engagement: record.engagement.clone(),
    })
}

/// Result of cleaning a batch of accepted records
#[derive(Debug, Clone, Default)]
pub struct CleaningOutcome {
    pub records: Vec<CleanedRecord>,
    pub rejected: Vec<Rejection>,
    /// Records placed in the `Unknown` segment by imputation
    pub imputed_payment: usize,
}

/// Clean every accepted record under one policy
pub fn clean_records(records: &[CustomerRecord], policy: &CleaningPolicy) -> CleaningOutcome {
    let mut outcome = CleaningOutcome::default();

    for record in records {
        match clean_record(record, policy) {
            Ok(cleaned) => {
                if cleaned.payment == PaymentSegment::Unknown {
                    outcome.imputed_payment += 1;
                }
                outcome.records.push(cleaned);
            }
            Err(error) => {
                tracing::debug!(line = record.line, reason = %error.reason(), "cleaner rejected row: {}", error);
                outcome.rejected.push(Rejection {
                    line: record.line,
                    customer_id: Some(record.customer_id.clone()),
                    reason: error.reason(),
                    error,
                    original: RejectedRow::Record(record.clone()),
                });
            }
        }
    }

    outcome
}
