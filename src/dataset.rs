//! CSV-backed tabular dataset with pandas-compatible dtype inference.

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Runtime datatype tag of a column, spelled the way schema files declare it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows x named columns, cells kept as read.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Load a comma-separated file.
    pub fn from_csv(path: &Path) -> Result<Self> {
        Self::from_csv_with_delimiter(path, b',')
    }

    pub fn from_csv_with_delimiter(path: &Path, delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        debug!("Loaded {} rows x {} columns from {}", rows.len(), headers.len(), path.display());
        Ok(Self { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_columns())
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Infer the dtype of one column.
    ///
    /// A numeric column with any empty cell is `float64`, as is a column with no values at all.
    pub fn dtype(&self, column: &str) -> Result<DType> {
        let idx = self.column_index(column)?;
        Ok(infer_dtype(self.rows.iter().map(|row| row.get(idx).map(String::as_str).unwrap_or(""))))
    }

    /// `(column, dtype)` pairs in column order
    pub fn dtypes(&self) -> Vec<(String, DType)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let dtype = infer_dtype(self.rows.iter().map(|row| row.get(idx).map(String::as_str).unwrap_or("")));
                (name.clone(), dtype)
            })
            .collect()
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect(),
        }
    }

    /// Drop rows with an empty cell or fewer cells than headers. Returns the number dropped.
    pub fn drop_incomplete_rows(&mut self) -> usize {
        let width = self.headers.len();
        let before = self.rows.len();
        self.rows
            .retain(|row| row.len() == width && row.iter().all(|cell| !cell.is_empty()));
        before - self.rows.len()
    }

    /// Split into a numeric feature matrix and target vector.
    pub fn features_and_target(&self, features: &[String], target: &str) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        let feature_idx: Vec<usize> = features
            .iter()
            .map(|f| self.column_index(f))
            .collect::<Result<_>>()?;
        let target_idx = self.column_index(target)?;

        let mut x = Vec::with_capacity(self.rows.len());
        let mut y = Vec::with_capacity(self.rows.len());
        for (row_no, row) in self.rows.iter().enumerate() {
            let values = feature_idx
                .iter()
                .map(|&i| self.numeric_cell(row, row_no, i))
                .collect::<Result<Vec<f64>>>()?;
            x.push(values);
            y.push(self.numeric_cell(row, row_no, target_idx)?);
        }
        Ok((x, y))
    }

    /// Every column except `target`, in dataset order.
    pub fn feature_columns(&self, target: &str) -> Vec<String> {
        self.headers.iter().filter(|h| h.as_str() != target).cloned().collect()
    }

    fn numeric_cell(&self, row: &[String], row_no: usize, col: usize) -> Result<f64> {
        let raw = row.get(col).map(String::as_str).unwrap_or("");
        raw.parse::<f64>().map_err(|e| PipelineError::InvalidInput {
            field: self.headers[col].clone(),
            reason: format!("row {}: '{}' is not numeric ({})", row_no + 1, raw, e),
        })
    }
}

fn infer_dtype<'a>(cells: impl Iterator<Item = &'a str>) -> DType {
    let mut any_value = false;
    let mut any_empty = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for cell in cells {
        if cell.is_empty() {
            any_empty = true;
            continue;
        }
        any_value = true;
        if all_int && cell.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && cell.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && !matches!(cell, "True" | "False" | "true" | "false") {
            all_bool = false;
        }
    }

    if !any_value {
        return DType::Float64;
    }
    if all_int && !any_empty {
        DType::Int64
    } else if all_float {
        DType::Float64
    } else if all_bool && !any_empty {
        DType::Bool
    } else {
        DType::Object
    }
}
