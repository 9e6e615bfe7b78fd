//! Error taxonomy: row-local rejection causes and fatal snapshot errors

use serde::Serialize;
use std::fmt;

use crate::schema::ColumnType;

/// Reason code attached to every rejected row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RejectReason {
    MissingColumn,
    TypeMismatch,
    DuplicateIdentifier,
    InvalidNumericValue,
    UnmappedChurnStatus,
    MissingPaymentBehavior,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::MissingColumn => "MissingColumn",
            RejectReason::TypeMismatch => "TypeMismatch",
            RejectReason::DuplicateIdentifier => "DuplicateIdentifier",
            RejectReason::InvalidNumericValue => "InvalidNumericValue",
            RejectReason::UnmappedChurnStatus => "UnmappedChurnStatus",
            RejectReason::MissingPaymentBehavior => "MissingPaymentBehavior",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a single row was excluded from the snapshot.
///
/// Row errors never abort a run; they are collected into the audit summary.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("missing value for required column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}' expects {expected}, got '{value}'")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("customer id '{customer_id}' already accepted on line {first_line}")]
    DuplicateIdentifier {
        customer_id: String,
        first_line: usize,
    },

    #[error("column '{column}' has invalid numeric value {value}")]
    InvalidNumericValue { column: String, value: f64 },

    #[error("churn status '{value}' does not map to Churned or Retained")]
    UnmappedChurnStatus { value: String },

    #[error("payment behavior '{value}' is missing or unrecognised and the policy is drop")]
    MissingPaymentBehavior { value: String },
}

impl RowError {
    pub fn reason(&self) -> RejectReason {
        match self {
            RowError::MissingColumn { .. } => RejectReason::MissingColumn,
            RowError::TypeMismatch { .. } => RejectReason::TypeMismatch,
            RowError::DuplicateIdentifier { .. } => RejectReason::DuplicateIdentifier,
            RowError::InvalidNumericValue { .. } => RejectReason::InvalidNumericValue,
            RowError::UnmappedChurnStatus { .. } => RejectReason::UnmappedChurnStatus,
            RowError::MissingPaymentBehavior { .. } => RejectReason::MissingPaymentBehavior,
        }
    }
}

/// Errors that abort a run before any report is produced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("required columns absent from source: {}", missing.join(", "))]
    SchemaUnrecoverable { missing: Vec<String> },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("headers '{first}' and '{second}' both standardise to '{name}'")]
    DuplicateHeader {
        first: String,
        second: String,
        name: String,
    },

    #[error("synonym '{key}' maps to both {first} and {second}")]
    ConflictingSynonym {
        key: String,
        first: String,
        second: String,
    },
}

/// Report-level condition that does not stop the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportWarning {
    EmptyDatasetAfterCleaning,
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportWarning::EmptyDatasetAfterCleaning => {
                f.write_str("no records left after cleaning; all rates are undefined")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_reason_codes() {
        let err = RowError::DuplicateIdentifier {
            customer_id: "42".to_string(),
            first_line: 3,
        };
        assert_eq!(err.reason(), RejectReason::DuplicateIdentifier);
        assert_eq!(
            err.to_string(),
            "customer id '42' already accepted on line 3"
        );

        let err = RowError::InvalidNumericValue {
            column: "tenure_months".to_string(),
            value: -1.0,
        };
        assert_eq!(err.reason().code(), "InvalidNumericValue");
    }

    #[test]
    fn test_schema_unrecoverable_lists_columns() {
        let err = SnapshotError::SchemaUnrecoverable {
            missing: vec!["customer_id".to_string(), "churn_status_yesno".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "required columns absent from source: customer_id, churn_status_yesno"
        );
    }
}
