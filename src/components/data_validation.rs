//! Schema conformance checks for the ingested dataset.
//!
//! Two independent checks share one plain-text status report:
//! - `validate_columns` overwrites the report and stops at the first dataset column
//!   the schema does not declare. Schema columns missing from the dataset are not
//!   detected.
//! - `validate_dtypes` appends a section listing every dtype mismatch.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::{DataValidationConfig, Schema};
use crate::dataset::Dataset;
use crate::error::Result;

const SECTION_RULE_WIDTH: usize = 50;

/// Booleans in the status report are capitalised (`True` / `False`)
fn status_word(ok: bool) -> &'static str {
    if ok {
        "True"
    } else {
        "False"
    }
}

/// Expected dtype recorded for a dataset column the schema does not declare
pub const ABSENT_FROM_SCHEMA: &str = "<absent>";

/// Outcome of both checks; `report` is the full status report text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    pub columns_ok: bool,
    pub dtypes_ok: bool,
    pub report: String,
}

impl ValidationStatus {
    pub fn passed(&self) -> bool {
        self.columns_ok && self.dtypes_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtypeMismatch {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Result of the column check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCheck {
    pub ok: bool,
    pub unknown_column: Option<String>,
}

/// Result of the dtype check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtypeCheck {
    pub ok: bool,
    pub mismatches: Vec<DtypeMismatch>,
}

pub struct SchemaValidator {
    config: DataValidationConfig,
}

impl SchemaValidator {
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn status_file(&self) -> &Path {
        &self.config.status_file
    }

    /// Check that every dataset column is declared in the schema, in dataset order.
    pub fn validate_columns(&self, data: &Dataset) -> Result<ColumnCheck> {
        let unknown = data
            .columns()
            .iter()
            .find(|col| !self.config.schema.contains(col))
            .cloned();

        let mut report = String::new();
        match &unknown {
            Some(col) => {
                report.push_str(&format!("Column Validation Status: {}\n", status_word(false)));
                report.push_str(&format!("Missing column in schema: {}\n", col));
                error!("Column '{}' not found in schema", col);
            }
            None => {
                report.push_str(&format!("Column Validation Status: {}\n", status_word(true)));
                info!("All columns validated successfully");
            }
        }
        fs::write(&self.config.status_file, report)?;

        Ok(ColumnCheck {
            ok: unknown.is_none(),
            unknown_column: unknown,
        })
    }

    /// Compare every column's inferred dtype with the schema and collect all mismatches.
    pub fn validate_dtypes(&self, data: &Dataset) -> Result<DtypeCheck> {
        let mismatches: Vec<DtypeMismatch> = data
            .dtypes()
            .into_iter()
            .filter_map(|(column, actual)| {
                let expected = self
                    .config
                    .schema
                    .expected_dtype(&column)
                    .unwrap_or(ABSENT_FROM_SCHEMA);
                (expected != actual.as_str()).then(|| DtypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.as_str().to_string(),
                    column,
                })
            })
            .collect();

        let rule = "=".repeat(SECTION_RULE_WIDTH);
        let mut section = format!("\n{rule}\nDatatype Validation:\n{rule}\n");
        if mismatches.is_empty() {
            section.push_str(&format!("Datatype Validation Status: {}\n", status_word(true)));
            section.push_str("[OK] All datatypes match the schema!\n");
            info!("All datatypes validated successfully");
        } else {
            section.push_str(&format!("Datatype Validation Status: {}\n", status_word(false)));
            section.push_str("Mismatches Found:\n");
            for m in &mismatches {
                let line = format!("  [X] {}: Expected '{}', Got '{}'", m.column, m.expected, m.actual);
                warn!("{}", line);
                section.push_str(&line);
                section.push('\n');
            }
            error!("Found {} datatype mismatches", mismatches.len());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.status_file)?;
        file.write_all(section.as_bytes())?;

        Ok(DtypeCheck {
            ok: mismatches.is_empty(),
            mismatches,
        })
    }

    /// Load the configured dataset once and run both checks.
    pub fn validate(&self) -> Result<ValidationStatus> {
        let data = Dataset::from_csv(&self.config.data_file)?;
        self.validate_dataset(&data)
    }

    pub fn validate_dataset(&self, data: &Dataset) -> Result<ValidationStatus> {
        let columns = self.validate_columns(data)?;
        let dtypes = self.validate_dtypes(data)?;
        let report = fs::read_to_string(&self.config.status_file)?;
        Ok(ValidationStatus {
            columns_ok: columns.ok,
            dtypes_ok: dtypes.ok,
            report,
        })
    }
}
