//! Data loading using Polars: the source file is read as text cells with
//! standardised snake_case headers. Type coercion happens in the schema
//! validator, not here.

use anyhow::Context;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::SnapshotError;

/// One source row: column name to raw cell text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRow {
    /// 1-based line in the source file (header is line 1)
    pub line: usize,
    /// Empty and whitespace-only cells are stored as `None`
    pub values: BTreeMap<String, Option<String>>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(line: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(column, value)| {
                let value = value.map(Into::into).filter(|v: &String| !v.trim().is_empty());
                (column.into(), value)
            })
            .collect();
        Self { line, values }
    }

    /// `None` when the row has no such column, `Some(None)` for a null cell
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.values.get(column).map(|v| v.as_deref())
    }
}

/// The whole ingested file
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Standardised header names in source order
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Converts free-form header text into snake_case column names
#[derive(Debug, Clone)]
pub struct HeaderNormalizer {
    punctuation: Regex,
    whitespace: Regex,
}

impl HeaderNormalizer {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            punctuation: Regex::new(r"[^\w\s]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// `"Churn Status (Yes/No)"` becomes `"churn_status_yesno"`
    pub fn normalize(&self, name: &str) -> String {
        let lowered = name.trim().to_lowercase();
        let stripped = self.punctuation.replace_all(&lowered, "");
        self.whitespace.replace_all(&stripped, "_").into_owned()
    }
}

/// Load a delimited file into a [`RawTable`]
///
/// # Arguments
/// * `file_path` - Path to the CSV export
///
/// # Returns
/// * All rows as text with standardised headers. A missing or unparsable
///   file is an error.
pub fn load_raw_table(file_path: &Path) -> crate::Result<RawTable> {
    if !file_path.exists() {
        anyhow::bail!(
            "CSV not found at {}. Place the customer export there or pass --input",
            file_path.display()
        );
    }

    // Every column as String; numeric coercion belongs to the validator
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to parse {}", file_path.display()))?;

    let table = dataframe_to_table(&df)?;
    tracing::info!(
        rows = table.len(),
        columns = table.headers.len(),
        "loaded {}",
        file_path.display()
    );

    Ok(table)
}

/// Convert an all-string DataFrame into rows keyed by standardised header
fn dataframe_to_table(df: &DataFrame) -> crate::Result<RawTable> {
    let normalizer = HeaderNormalizer::new()?;
    let mut headers = Vec::with_capacity(df.width());
    let mut columns: Vec<Vec<Option<String>>> = Vec::with_capacity(df.width());
    let mut seen: HashMap<String, String> = HashMap::new();

    for series in df.get_columns() {
        let original = series.name().to_string();
        let name = normalizer.normalize(&original);
        if let Some(first) = seen.insert(name.clone(), original.clone()) {
            return Err(SnapshotError::DuplicateHeader {
                first,
                second: original,
                name,
            }
            .into());
        }

        let values = series
            .str()?
            .into_iter()
            .map(|cell| cell.map(str::to_owned))
            .collect();
        headers.push(name);
        columns.push(values);
    }

    let rows = (0..df.height())
        .map(|idx| {
            let cells = headers
                .iter()
                .zip(&columns)
                .map(|(header, column)| (header.clone(), column[idx].clone()));
            RawRow::from_pairs(idx + 2, cells)
        })
        .collect();

    Ok(RawTable { headers, rows })
}
