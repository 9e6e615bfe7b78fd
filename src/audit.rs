//! Data-quality audit accumulated alongside the KPI report

use serde::Serialize;
use std::collections::BTreeMap;

use crate::clean::MissingPaymentPolicy;
use crate::error::RejectReason;
use crate::schema::Rejection;

/// How many rows made it through, and why the others did not
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummary {
    pub total_rows: usize,
    /// Rows accepted by the schema validator
    pub accepted: usize,
    /// Rows that reached the aggregator
    pub cleaned: usize,
    pub rejected: usize,
    pub imputed_payment: usize,
    pub missing_payment_policy: MissingPaymentPolicy,
    pub rejections_by_reason: BTreeMap<RejectReason, usize>,
    /// Validator rejections first, then cleaner rejections, each in row order
    pub rejections: Vec<Rejection>,
}

impl AuditSummary {
    pub fn new(
        total_rows: usize,
        accepted: usize,
        cleaned: usize,
        imputed_payment: usize,
        missing_payment_policy: MissingPaymentPolicy,
        rejections: Vec<Rejection>,
    ) -> Self {
        let mut rejections_by_reason = BTreeMap::new();
        for rejection in &rejections {
            *rejections_by_reason.entry(rejection.reason).or_insert(0) += 1;
        }

        Self {
            total_rows,
            accepted,
            cleaned,
            rejected: rejections.len(),
            imputed_payment,
            missing_payment_policy,
            rejections_by_reason,
            rejections,
        }
    }

    /// Every raw row is either cleaned or rejected
    pub fn is_balanced(&self) -> bool {
        self.cleaned + self.rejected == self.total_rows
    }

    pub fn count(&self, reason: RejectReason) -> usize {
        self.rejections_by_reason.get(&reason).copied().unwrap_or(0)
    }

    /// Emit the audit through tracing
    pub fn log(&self) {
        tracing::info!(
            total = self.total_rows,
            accepted = self.accepted,
            cleaned = self.cleaned,
            imputed_payment = self.imputed_payment,
            policy = %self.missing_payment_policy,
            "audit complete"
        );
        for (reason, count) in &self.rejections_by_reason {
            tracing::warn!(reason = %reason, count, "rows rejected");
        }
    }
}
