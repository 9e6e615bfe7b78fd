//! Schema description and row validation.
//!
//! The schema is checked once against the header (fatal when required
//! columns are missing), then every row is coerced into a
//! [`CustomerRecord`] or rejected with a typed [`RowError`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::ColumnNames;
use crate::data::RawRow;
use crate::error::{RejectReason, RowError, SnapshotError};
use crate::model::CustomerRecord;

/// Declared type of a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => f.write_str("text"),
            ColumnType::Number => f.write_str("a number"),
        }
    }
}

/// Which [`CustomerRecord`] field a column feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnRole {
    CustomerId,
    ChurnStatus,
    PaymentBehavior,
    PlanTier,
    TenureMonths,
    Engagement,
}

impl ColumnRole {
    pub fn column_type(self) -> ColumnType {
        match self {
            ColumnRole::TenureMonths | ColumnRole::Engagement => ColumnType::Number,
            _ => ColumnType::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub role: ColumnRole,
    pub column_type: ColumnType,
    /// A null cell is acceptable
    pub nullable: bool,
    /// The header must contain this column
    pub required: bool,
}

impl ColumnSpec {
    /// Spec with the default type, nullability and presence for `role`
    pub fn new(name: impl Into<String>, role: ColumnRole) -> Self {
        let (nullable, required) = match role {
            ColumnRole::CustomerId | ColumnRole::ChurnStatus => (false, true),
            ColumnRole::PaymentBehavior => (true, true),
            ColumnRole::PlanTier | ColumnRole::TenureMonths | ColumnRole::Engagement => {
                (true, false)
            }
        };
        Self {
            name: name.into(),
            role,
            column_type: role.column_type(),
            nullable,
            required,
        }
    }
}

/// The original content of a rejected row, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedRow {
    Raw(RawRow),
    Record(CustomerRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub line: usize,
    pub customer_id: Option<String>,
    pub reason: RejectReason,
    pub error: RowError,
    pub original: RejectedRow,
}

/// Per-row result of validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(CustomerRecord),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }
}

/// Split outcomes into accepted records and rejections, keeping order
pub fn partition_outcomes(
    outcomes: Vec<ValidationOutcome>,
) -> (Vec<CustomerRecord>, Vec<Rejection>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for outcome in outcomes {
        match outcome {
            ValidationOutcome::Accepted(record) => accepted.push(record),
            ValidationOutcome::Rejected(rejection) => rejected.push(rejection),
        }
    }
    (accepted, rejected)
}

/// Expected columns of the source table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Build a schema, checking that it can produce a [`CustomerRecord`]
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, SnapshotError> {
        let mut names = HashMap::new();
        for spec in &columns {
            if names.insert(spec.name.as_str(), spec.role).is_some() {
                return Err(SnapshotError::InvalidSchema(format!(
                    "column '{}' declared twice",
                    spec.name
                )));
            }
            if spec.column_type != spec.role.column_type() {
                return Err(SnapshotError::InvalidSchema(format!(
                    "column '{}' must be {} for role {:?}",
                    spec.name,
                    spec.role.column_type(),
                    spec.role
                )));
            }
        }

        for role in [
            ColumnRole::CustomerId,
            ColumnRole::ChurnStatus,
            ColumnRole::PaymentBehavior,
            ColumnRole::PlanTier,
            ColumnRole::TenureMonths,
        ] {
            let specs: Vec<_> = columns.iter().filter(|c| c.role == role).collect();
            let mandatory = matches!(
                role,
                ColumnRole::CustomerId | ColumnRole::ChurnStatus | ColumnRole::PaymentBehavior
            );
            match specs.as_slice() {
                [] if mandatory => {
                    return Err(SnapshotError::InvalidSchema(format!(
                        "no column declared for {:?}",
                        role
                    )));
                }
                [spec] if mandatory && !spec.required => {
                    return Err(SnapshotError::InvalidSchema(format!(
                        "column '{}' for {:?} must be required",
                        spec.name, role
                    )));
                }
                [_, _, ..] => {
                    return Err(SnapshotError::InvalidSchema(format!(
                        "more than one column declared for {:?}",
                        role
                    )));
                }
                _ => {}
            }
        }

        if columns
            .iter()
            .any(|c| c.role == ColumnRole::CustomerId && c.nullable)
        {
            return Err(SnapshotError::InvalidSchema(
                "customer id column cannot be nullable".to_string(),
            ));
        }

        Ok(Self { columns })
    }

    /// Default schema over the configured column names
    pub fn from_columns(names: &ColumnNames) -> Result<Self, SnapshotError> {
        let mut columns = vec![
            ColumnSpec::new(&names.customer_id, ColumnRole::CustomerId),
            ColumnSpec::new(&names.churn_status, ColumnRole::ChurnStatus),
            ColumnSpec::new(&names.payment_behavior, ColumnRole::PaymentBehavior),
            ColumnSpec::new(&names.plan_tier, ColumnRole::PlanTier),
            ColumnSpec::new(&names.tenure_months, ColumnRole::TenureMonths),
        ];
        columns.extend(
            names
                .engagement
                .iter()
                .map(|name| ColumnSpec::new(name, ColumnRole::Engagement)),
        );
        Self::new(columns)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn id_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::CustomerId)
            .map(|c| c.name.as_str())
    }

    /// Check the schema against a source header.
    ///
    /// Fails with [`SnapshotError::SchemaUnrecoverable`] when any required
    /// column is absent. Optional columns the header lacks are dropped from
    /// the returned schema.
    pub fn bind(&self, headers: &[String]) -> Result<Schema, SnapshotError> {
        let present = |name: &str| headers.iter().any(|h| h == name);

        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.required && !present(&c.name))
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SnapshotError::SchemaUnrecoverable { missing });
        }

        let mut columns = Vec::with_capacity(self.columns.len());
        for spec in &self.columns {
            if present(&spec.name) {
                columns.push(spec.clone());
            } else {
                tracing::info!(column = %spec.name, "optional column not in source, skipping");
            }
        }

        Ok(Schema { columns })
    }

    /// Coerce one row into a record, without the duplicate check
    pub fn validate_row(&self, row: &RawRow) -> Result<CustomerRecord, RowError> {
        let mut record = CustomerRecord {
            line: row.line,
            customer_id: String::new(),
            churn_status: String::new(),
            payment_behavior: None,
            plan_tier: None,
            tenure_months: None,
            engagement: BTreeMap::new(),
        };

        for spec in &self.columns {
            let cell = match row.get(&spec.name) {
                Some(cell) => cell.map(str::trim).filter(|v| !v.is_empty()),
                None if spec.required => {
                    return Err(RowError::MissingColumn {
                        column: spec.name.clone(),
                    });
                }
                None => continue,
            };

            let Some(text) = cell else {
                if spec.nullable {
                    continue;
                }
                return Err(RowError::MissingColumn {
                    column: spec.name.clone(),
                });
            };

            match spec.role {
                ColumnRole::CustomerId => record.customer_id = text.to_string(),
                ColumnRole::ChurnStatus => record.churn_status = text.to_string(),
                ColumnRole::PaymentBehavior => record.payment_behavior = Some(text.to_string()),
                ColumnRole::PlanTier => record.plan_tier = Some(text.to_string()),
                ColumnRole::TenureMonths => record.tenure_months = Some(parse_number(spec, text)?),
                ColumnRole::Engagement => {
                    record
                        .engagement
                        .insert(spec.name.clone(), parse_number(spec, text)?);
                }
            }
        }

        Ok(record)
    }

    /// Validate every row of a run.
    ///
    /// The first accepted occurrence of a customer id wins; later rows with
    /// the same id are rejected with `DuplicateIdentifier`.
    pub fn validate(&self, rows: &[RawRow]) -> Vec<ValidationOutcome> {
        let mut accepted_ids: HashMap<String, usize> = HashMap::new();
        let mut outcomes = Vec::with_capacity(rows.len());

        for row in rows {
            let result = self.validate_row(row).and_then(|record| {
                match accepted_ids.get(&record.customer_id) {
                    Some(&first_line) => Err(RowError::DuplicateIdentifier {
                        customer_id: record.customer_id,
                        first_line,
                    }),
                    None => {
                        accepted_ids.insert(record.customer_id.clone(), record.line);
                        Ok(record)
                    }
                }
            });

            let outcome = match result {
                Ok(record) => ValidationOutcome::Accepted(record),
                Err(error) => {
                    tracing::debug!(line = row.line, reason = %error.reason(), "validator rejected row: {}", error);
                    ValidationOutcome::Rejected(self.reject(row, error))
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    fn reject(&self, row: &RawRow, error: RowError) -> Rejection {
        let customer_id = self
            .id_column()
            .and_then(|column| row.get(column).flatten())
            .map(|id| id.trim().to_string());

        Rejection {
            line: row.line,
            customer_id,
            reason: error.reason(),
            error,
            original: RejectedRow::Raw(row.clone()),
        }
    }
}

fn parse_number(spec: &ColumnSpec, text: &str) -> Result<f64, RowError> {
    text.parse::<f64>().map_err(|_| RowError::TypeMismatch {
        column: spec.name.clone(),
        expected: spec.column_type,
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        let names = ColumnNames {
            engagement: vec!["logins".to_string()],
            ..ColumnNames::default()
        };
        Schema::from_columns(&names).unwrap()
    }

    fn headers() -> Vec<String> {
        [
            "customer_id",
            "churn_status_yesno",
            "payment_history_ontimedelayed",
            "tenure_months",
            "logins",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }

    fn row(line: usize, id: Option<&str>, churn: &str, tenure: &str) -> RawRow {
        RawRow::from_pairs(
            line,
            [
                ("customer_id", id),
                ("churn_status_yesno", Some(churn)),
                ("payment_history_ontimedelayed", Some("On-Time")),
                ("tenure_months", Some(tenure)),
                ("logins", Some("4")),
            ],
        )
    }

    #[test]
    fn test_bind_drops_absent_optional_columns() {
        let bound = schema().bind(&headers()).unwrap();
        let names: Vec<&str> = bound.columns().iter().map(|c| c.name.as_str()).collect();
        assert!(!names.contains(&"plan_tier"));
        assert!(names.contains(&"logins"));
    }

    #[test]
    fn test_bind_missing_required_is_unrecoverable() {
        let headers = vec!["customer_id".to_string(), "tenure_months".to_string()];
        let err = schema().bind(&headers).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::SchemaUnrecoverable {
                missing: vec![
                    "churn_status_yesno".to_string(),
                    "payment_history_ontimedelayed".to_string()
                ]
            }
        );
    }

    #[test]
    fn test_validate_row_coerces_types() {
        let bound = schema().bind(&headers()).unwrap();
        let record = bound.validate_row(&row(2, Some(" 17 "), "Yes", "12.5")).unwrap();

        assert_eq!(record.customer_id, "17");
        assert_eq!(record.churn_status, "Yes");
        assert_eq!(record.payment_behavior.as_deref(), Some("On-Time"));
        assert_eq!(record.tenure_months, Some(12.5));
        assert_eq!(record.engagement.get("logins"), Some(&4.0));
        assert_eq!(record.plan_tier, None);
    }

    #[test]
    fn test_type_mismatch() {
        let bound = schema().bind(&headers()).unwrap();
        let err = bound.validate_row(&row(2, Some("1"), "Yes", "twelve")).unwrap_err();
        assert_eq!(err.reason(), RejectReason::TypeMismatch);
    }

    #[test]
    fn test_non_finite_numbers_pass_validation() {
        // Range checks belong to the cleaner
        let bound = schema().bind(&headers()).unwrap();
        let record = bound.validate_row(&row(2, Some("1"), "Yes", "NaN")).unwrap();
        assert!(record.tenure_months.unwrap().is_nan());
    }

    #[test]
    fn test_missing_value_in_required_column() {
        let bound = schema().bind(&headers()).unwrap();
        let err = bound.validate_row(&row(2, None, "Yes", "1")).unwrap_err();
        assert_eq!(
            err,
            RowError::MissingColumn {
                column: "customer_id".to_string()
            }
        );

        let absent = RawRow::from_pairs(3, [("customer_id", Some("9"))]);
        let err = bound.validate_row(&absent).unwrap_err();
        assert_eq!(err.reason(), RejectReason::MissingColumn);
    }

    #[test]
    fn test_duplicate_identifier_first_wins() {
        let bound = schema().bind(&headers()).unwrap();
        let rows = vec![
            row(2, Some("1"), "Yes", "1"),
            row(3, Some("1"), "No", "2"),
            row(4, Some("2"), "No", "3"),
        ];

        let outcomes = bound.validate(&rows);
        assert_eq!(outcomes.len(), rows.len());
        assert!(outcomes[0].is_accepted());
        assert!(outcomes[2].is_accepted());

        match &outcomes[1] {
            ValidationOutcome::Rejected(rejection) => {
                assert_eq!(rejection.reason, RejectReason::DuplicateIdentifier);
                assert_eq!(rejection.customer_id.as_deref(), Some("1"));
                assert_eq!(
                    rejection.error,
                    RowError::DuplicateIdentifier {
                        customer_id: "1".to_string(),
                        first_line: 2
                    }
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let (accepted, _) = partition_outcomes(outcomes);
        assert_eq!(accepted[0].churn_status, "Yes");
    }

    #[test]
    fn test_rejected_row_does_not_claim_identifier() {
        let bound = schema().bind(&headers()).unwrap();
        let rows = vec![row(2, Some("1"), "Yes", "bad"), row(3, Some("1"), "No", "2")];

        let outcomes = bound.validate(&rows);
        assert!(!outcomes[0].is_accepted());
        assert!(outcomes[1].is_accepted());
    }

    #[test]
    fn test_outcome_count_matches_input() {
        let bound = schema().bind(&headers()).unwrap();
        let rows = vec![
            row(2, Some("1"), "Yes", "1"),
            row(3, None, "No", "2"),
            row(4, Some("3"), "No", "x"),
            row(5, Some("1"), "No", "4"),
        ];

        let (accepted, rejected) = partition_outcomes(bound.validate(&rows));
        assert_eq!(accepted.len() + rejected.len(), rows.len());
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_invalid_schema_definitions() {
        let no_id = vec![
            ColumnSpec::new("churn", ColumnRole::ChurnStatus),
            ColumnSpec::new("pay", ColumnRole::PaymentBehavior),
        ];
        assert!(Schema::new(no_id).is_err());

        let mut tenure = ColumnSpec::new("tenure", ColumnRole::TenureMonths);
        tenure.column_type = ColumnType::Text;
        let wrong_type = vec![
            ColumnSpec::new("id", ColumnRole::CustomerId),
            ColumnSpec::new("churn", ColumnRole::ChurnStatus),
            ColumnSpec::new("pay", ColumnRole::PaymentBehavior),
            tenure,
        ];
        assert!(Schema::new(wrong_type).is_err());
    }
}
