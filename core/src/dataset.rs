//! Labelled training dataset loaded from CSV.

use crate::{
    error::{FraudError, FraudResult},
    schema::{FeatureSchema, FieldKind},
    types::{FieldValue, RawRecord},
};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub labels: Vec<String>,
}

impl Dataset {
    pub fn new(records: Vec<RawRecord>, labels: Vec<String>) -> FraudResult<Self> {
        if records.len() != labels.len() {
            return Err(FraudError::TrainingData {
                reason: format!(
                    "{} records but {} labels",
                    records.len(),
                    labels.len()
                ),
            });
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows at the given indices, in index order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    /// Read a CSV with a header row. Cells are typed by the schema;
    /// columns the schema does not name are ignored.
    pub fn from_csv_path(
        path: impl AsRef<Path>,
        schema: &FeatureSchema,
        label_column: &str,
    ) -> FraudResult<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)?;
        let dataset = Self::from_csv_reader(reader, schema, label_column)?;
        log::info!(
            "dataset: loaded {} rows from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_csv_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        schema: &FeatureSchema,
        label_column: &str,
    ) -> FraudResult<Self> {
        let headers = reader.headers()?.clone();
        let label_idx = headers
            .iter()
            .position(|h| h == label_column)
            .ok_or_else(|| FraudError::TrainingData {
                reason: format!("label column '{label_column}' not found in dataset header"),
            })?;

        let typed_columns: Vec<(usize, &str, FieldKind)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| schema.kind_of(h).map(|kind| (idx, h, kind)))
            .collect();

        let mut records = Vec::new();
        let mut labels = Vec::new();

        for (row_idx, result) in reader.records().enumerate() {
            let row = result?;

            let label = row.get(label_idx).map(str::trim).unwrap_or_default();
            if label.is_empty() {
                return Err(FraudError::TrainingData {
                    reason: format!("row {row_idx} has no value in '{label_column}'"),
                });
            }

            let mut record = RawRecord::new();
            for &(idx, name, kind) in &typed_columns {
                let cell = row.get(idx).map(str::trim).unwrap_or_default();
                record.insert(name.to_string(), parse_cell(name, cell, kind)?);
            }

            records.push(record);
            labels.push(label.to_string());
        }

        Dataset::new(records, labels)
    }
}

fn parse_cell(field: &str, cell: &str, kind: FieldKind) -> FraudResult<FieldValue> {
    if cell.is_empty() {
        return Ok(FieldValue::Missing);
    }
    match kind {
        FieldKind::Numeric => {
            if let Ok(v) = cell.parse::<i64>() {
                Ok(FieldValue::Integer(v))
            } else if let Ok(v) = cell.parse::<f64>() {
                Ok(FieldValue::Float(v))
            } else {
                Err(FraudError::MalformedValue {
                    field: field.to_string(),
                    value: cell.to_string(),
                })
            }
        }
        FieldKind::Categorical | FieldKind::Date | FieldKind::Identifier => {
            Ok(FieldValue::Text(cell.to_string()))
        }
    }
}
