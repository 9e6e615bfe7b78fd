//! KPI aggregation over cleaned records.
//!
//! Everything is computed in one pass over the cleaned set. Rates with a zero
//! denominator are [`Rate::NoData`], never `0.0` or NaN.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::clean::MissingPaymentPolicy;
use crate::error::ReportWarning;
use crate::model::{ChurnStatus, CleanedRecord, PaymentSegment};

/// Label used for records without a plan tier
pub const UNSPECIFIED_TIER: &str = "unspecified";

/// A ratio that is explicitly undefined when its denominator is zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Rate {
    Value(f64),
    NoData,
}

impl Rate {
    pub fn from_counts(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Rate::NoData
        } else {
            Rate::Value(numerator as f64 / denominator as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Rate::Value(v) => Some(v),
            Rate::NoData => None,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Value(v) => write!(f, "{:.3}", v),
            Rate::NoData => f.write_str("no data"),
        }
    }
}

/// Churn within one payment-behavior segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentKpi {
    pub segment: PaymentSegment,
    pub users: usize,
    pub churned: usize,
    pub churn_rate: Rate,
}

/// One cell of the churn status × payment behavior cross-tabulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrossTabCell {
    pub churn: ChurnStatus,
    pub payment: PaymentSegment,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierKpi {
    pub plan_tier: String,
    pub users: usize,
    pub churned: usize,
    pub churn_rate: Rate,
}

/// Averages over the records of one churn status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusProfile {
    pub churn: ChurnStatus,
    pub users: usize,
    /// Mean over records that carry a tenure value
    pub mean_tenure_months: Option<f64>,
    /// Per metric, mean over records that carry it
    pub mean_engagement: BTreeMap<String, f64>,
}

/// Aggregated output of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub total_records: usize,
    pub churned: usize,
    pub retained: usize,
    pub overall_churn_rate: Rate,
    /// Canonical segment order
    pub by_payment: Vec<SegmentKpi>,
    /// Segment-major, Churned before Retained
    pub crosstab: Vec<CrossTabCell>,
    pub by_plan_tier: Vec<TierKpi>,
    pub status_profiles: Vec<StatusProfile>,
    /// Delayed churn rate divided by on-time churn rate
    pub delayed_relative_risk: Option<f64>,
    pub warnings: Vec<ReportWarning>,
}

impl KpiReport {
    pub fn segment(&self, segment: PaymentSegment) -> Option<&SegmentKpi> {
        self.by_payment.iter().find(|s| s.segment == segment)
    }

    pub fn crosstab_count(&self, churn: ChurnStatus, payment: PaymentSegment) -> usize {
        self.crosstab
            .iter()
            .find(|c| c.churn == churn && c.payment == payment)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct StatusAccumulator {
    users: usize,
    tenure_sum: f64,
    tenure_count: usize,
    engagement: BTreeMap<String, (f64, usize)>,
}

impl StatusAccumulator {
    fn add(&mut self, record: &CleanedRecord) {
        self.users += 1;
        if let Some(tenure) = record.tenure_months {
            self.tenure_sum += tenure;
            self.tenure_count += 1;
        }
        for (metric, &value) in &record.engagement {
            let entry = self.engagement.entry(metric.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    fn finish(self, churn: ChurnStatus) -> StatusProfile {
        let mean_tenure_months =
            (self.tenure_count > 0).then(|| self.tenure_sum / self.tenure_count as f64);
        let mean_engagement = self
            .engagement
            .into_iter()
            .map(|(metric, (sum, count))| (metric, sum / count as f64))
            .collect();
        StatusProfile {
            churn,
            users: self.users,
            mean_tenure_months,
            mean_engagement,
        }
    }
}

/// Compute the KPI report for a cleaned record set
///
/// # Arguments
/// * `records` - Cleaned records; each is counted exactly once
/// * `policy` - Missing-payment policy of the run, fixing which segments are
///   always listed
///
/// # Returns
/// * The report. An empty input yields `NoData` rates and the
///   `EmptyDatasetAfterCleaning` warning.
pub fn aggregate(records: &[CleanedRecord], policy: MissingPaymentPolicy) -> KpiReport {
    let mut pairs: BTreeMap<(PaymentSegment, ChurnStatus), usize> = BTreeMap::new();
    let mut tiers: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut profiles: BTreeMap<ChurnStatus, StatusAccumulator> = BTreeMap::new();

    for record in records {
        *pairs.entry((record.payment, record.churn)).or_insert(0) += 1;

        let tier = record.plan_tier.as_deref().unwrap_or(UNSPECIFIED_TIER);
        let entry = tiers.entry(tier.to_string()).or_insert((0, 0));
        entry.0 += 1;
        if record.churn == ChurnStatus::Churned {
            entry.1 += 1;
        }

        profiles.entry(record.churn).or_default().add(record);
    }

    // Listed segments plus anything observed outside them
    let mut segments: Vec<PaymentSegment> = policy.segments().to_vec();
    for &(segment, _) in pairs.keys() {
        if !segments.contains(&segment) {
            segments.push(segment);
        }
    }
    segments.sort();

    let count = |segment: PaymentSegment, churn: ChurnStatus| -> usize {
        pairs.get(&(segment, churn)).copied().unwrap_or(0)
    };

    let by_payment: Vec<SegmentKpi> = segments
        .iter()
        .map(|&segment| {
            let churned = count(segment, ChurnStatus::Churned);
            let users = churned + count(segment, ChurnStatus::Retained);
            SegmentKpi {
                segment,
                users,
                churned,
                churn_rate: Rate::from_counts(churned, users),
            }
        })
        .collect();

    let crosstab = segments
        .iter()
        .flat_map(|&payment| ChurnStatus::ALL.into_iter().map(move |churn| (payment, churn)))
        .map(|(payment, churn)| CrossTabCell {
            churn,
            payment,
            count: count(payment, churn),
        })
        .collect();

    let by_plan_tier = tiers
        .into_iter()
        .map(|(plan_tier, (users, churned))| TierKpi {
            plan_tier,
            users,
            churned,
            churn_rate: Rate::from_counts(churned, users),
        })
        .collect();

    let status_profiles = ChurnStatus::ALL
        .into_iter()
        .map(|churn| profiles.remove(&churn).unwrap_or_default().finish(churn))
        .collect();

    let total_records = records.len();
    let churned: usize = pairs
        .iter()
        .filter(|((_, churn), _)| *churn == ChurnStatus::Churned)
        .map(|(_, n)| n)
        .sum();

    let rate_of = |segment| {
        by_payment
            .iter()
            .find(|s: &&SegmentKpi| s.segment == segment)
            .and_then(|s| s.churn_rate.value())
    };
    let delayed_relative_risk = match (
        rate_of(PaymentSegment::Delayed),
        rate_of(PaymentSegment::OnTime),
    ) {
        (Some(delayed), Some(on_time)) if on_time > 0.0 => Some(delayed / on_time),
        _ => None,
    };

    let mut warnings = Vec::new();
    if total_records == 0 {
        tracing::warn!("{}", ReportWarning::EmptyDatasetAfterCleaning);
        warnings.push(ReportWarning::EmptyDatasetAfterCleaning);
    }

    KpiReport {
        total_records,
        churned,
        retained: total_records - churned,
        overall_churn_rate: Rate::from_counts(churned, total_records),
        by_payment,
        crosstab,
        by_plan_tier,
        status_profiles,
        delayed_relative_risk,
        warnings,
    }
}
