//! Customer records and the categorical domains they resolve into

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Whether a customer's subscription lapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChurnStatus {
    Churned,
    Retained,
}

impl ChurnStatus {
    /// Canonical report order
    pub const ALL: [ChurnStatus; 2] = [ChurnStatus::Churned, ChurnStatus::Retained];

    pub fn label(self) -> &'static str {
        match self {
            ChurnStatus::Churned => "Churned",
            ChurnStatus::Retained => "Retained",
        }
    }
}

impl fmt::Display for ChurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment behavior segment.
///
/// Declaration order is the canonical ordering used by every table and chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PaymentSegment {
    OnTime,
    Delayed,
    Unknown,
}

impl PaymentSegment {
    pub const ALL: [PaymentSegment; 3] = [
        PaymentSegment::OnTime,
        PaymentSegment::Delayed,
        PaymentSegment::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentSegment::OnTime => "OnTime",
            PaymentSegment::Delayed => "Delayed",
            PaymentSegment::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PaymentSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A row accepted by the schema validator.
///
/// Types are coerced but categorical fields still carry the source text;
/// the cleaner resolves them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    /// 1-based line in the source file (header is line 1)
    pub line: usize,
    pub customer_id: String,
    pub churn_status: String,
    pub payment_behavior: Option<String>,
    pub plan_tier: Option<String>,
    pub tenure_months: Option<f64>,
    /// Engagement metrics keyed by column name
    pub engagement: BTreeMap<String, f64>,
}

/// A record ready for aggregation: every categorical is resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedRecord {
    pub line: usize,
    pub customer_id: String,
    pub churn: ChurnStatus,
    pub payment: PaymentSegment,
    pub plan_tier: Option<String>,
    pub tenure_months: Option<f64>,
    pub engagement: BTreeMap<String, f64>,
}

impl From<&CleanedRecord> for CustomerRecord {
    /// Render canonical labels back into source form. `Unknown` payment
    /// becomes a missing value, since that is the only way it arises.
    fn from(record: &CleanedRecord) -> Self {
        let payment_behavior = match record.payment {
            PaymentSegment::Unknown => None,
            segment => Some(segment.label().to_string()),
        };

        CustomerRecord {
            line: record.line,
            customer_id: record.customer_id.clone(),
            churn_status: record.churn.label().to_string(),
            payment_behavior,
            plan_tier: record.plan_tier.clone(),
            tenure_months: record.tenure_months,
            engagement: record.engagement.clone(),
        }
    }
}
