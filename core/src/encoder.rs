//! Feature encoder: the single preprocessing path shared by training
//! and inference.
//!
//! RULE: There is exactly one way to turn a raw claim into a feature
//! vector, and it is `FeatureEncoder::transform`. Training, the
//! inference service and the legacy vector path all go through the
//! fitted state held here. Nothing is re-fitted after `fit` returns.
//!
//! Transform order:
//!   1. Decompose date fields into year / month / day.
//!   2. Drop identifier fields (they have no column in the layout).
//!   3. Impute missing numeric values with the fitted mean and missing
//!      categorical values with the fitted mode.
//!   4. Map categoricals through their fitted CategoryEncoder.
//!   5. Scale with the fitted Scaler.

use crate::{
    error::{FraudError, FraudResult},
    schema::{ColumnSource, DatePart, FeatureSchema, FieldKind},
    types::{FeatureVector, FieldValue, Matrix, RawRecord},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Category encoder ─────────────────────────────────────────────────────────

/// Label → code mapping for one categorical field.
/// Codes follow sorted label order, so refitting on the same data
/// always reproduces the same codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    labels: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        Self { labels: set.into_iter().collect() }
    }

    pub fn encode(&self, field: &str, value: &str) -> FraudResult<usize> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(value))
            .map_err(|_| FraudError::UnknownCategory {
                field: field.to_string(),
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ── Scaler ───────────────────────────────────────────────────────────────────

/// Per-column standardisation learned from the encoded, unscaled
/// training matrix. Constant columns are stored with std = 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    pub fn fit(columns: Vec<String>, matrix: &[FeatureVector]) -> FraudResult<Self> {
        if matrix.is_empty() {
            return Err(FraudError::EmptyDataset {
                context: "cannot fit scaler on zero rows".into(),
            });
        }
        let width = columns.len();
        let n = matrix.len() as f64;
        let mut mean = vec![0.0; width];
        let mut std = vec![0.0; width];

        for row in matrix {
            check_width(width, row.len())?;
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        for row in matrix {
            for ((s, x), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for (s, name) in std.iter_mut().zip(&columns) {
            *s = (*s / n).sqrt();
            if !s.is_finite() || *s == 0.0 {
                log::debug!("scaler: column '{name}' is constant, using unit std");
                *s = 1.0;
            }
        }

        Ok(Self { columns, mean, std })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> FraudResult<FeatureVector> {
        check_width(self.width(), row.len())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Structural checks run when a scaler is loaded from disk.
    pub fn validate(&self) -> FraudResult<()> {
        check_width(self.columns.len(), self.mean.len())?;
        check_width(self.columns.len(), self.std.len())?;
        if self.std.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(FraudError::Other(anyhow::anyhow!(
                "scaler contains a zero or non-finite standard deviation"
            )));
        }
        Ok(())
    }
}

fn check_width(expected: usize, actual: usize) -> FraudResult<()> {
    if expected != actual {
        return Err(FraudError::ColumnMismatch { expected, actual });
    }
    Ok(())
}

// ── Encoder table ────────────────────────────────────────────────────────────

/// Values used to impute missing cells, learned at fit time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FillValues {
    /// Numeric field → training mean.
    pub numeric: BTreeMap<String, f64>,
    /// Categorical field → training mode.
    pub categorical: BTreeMap<String, String>,
    /// Date-part column name → training mean.
    pub date_parts: BTreeMap<String, f64>,
}

/// Everything the encoder needs except the scaler: schema, column
/// layout, per-field category encoders and imputation values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderTable {
    pub schema: FeatureSchema,
    pub columns: Vec<ColumnSource>,
    pub category_encoders: BTreeMap<String, CategoryEncoder>,
    pub fill: FillValues,
}

impl EncoderTable {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(ColumnSource::column_name).collect()
    }

    /// Structural checks run when a table is loaded from disk.
    pub fn validate(&self) -> FraudResult<()> {
        self.schema.validate()?;
        if self.columns != self.schema.columns() {
            return Err(FraudError::ColumnMismatch {
                expected: self.schema.feature_count(),
                actual: self.columns.len(),
            });
        }
        for field in self.schema.fields_of(FieldKind::Categorical) {
            match self.category_encoders.get(field) {
                Some(enc) if !enc.is_empty() => {}
                _ => {
                    return Err(FraudError::Other(anyhow::anyhow!(
                        "no category encoder for field '{field}'"
                    )))
                }
            }
        }
        Ok(())
    }
}

// ── Feature encoder ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    table: EncoderTable,
    scaler: Scaler,
}

impl FeatureEncoder {
    /// Fit the encoder on training rows. `target` must run parallel to
    /// `rows`; labels themselves are encoded by the TargetEncoder.
    pub fn fit(schema: FeatureSchema, rows: &[RawRecord], target: &[String]) -> FraudResult<Self> {
        if rows.is_empty() {
            return Err(FraudError::EmptyDataset {
                context: "cannot fit feature encoder on zero rows".into(),
            });
        }
        if target.len() != rows.len() {
            return Err(FraudError::TrainingData {
                reason: format!("{} rows but {} target labels", rows.len(), target.len()),
            });
        }
        schema.validate()?;

        for (row_idx, row) in rows.iter().enumerate() {
            for field in schema.required_fields() {
                if !row.contains_key(field) {
                    return Err(FraudError::MissingField { field: field.to_string(), row: row_idx });
                }
            }
        }

        let mut fill = FillValues::default();
        let mut category_encoders = BTreeMap::new();

        for field in schema.fields_of(FieldKind::Numeric) {
            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                if let Some(v) = numeric_value(field, &row[field])? {
                    values.push(v);
                }
            }
            fill.numeric.insert(field.to_string(), mean_or_zero(field, &values));
        }

        for field in schema.fields_of(FieldKind::Categorical) {
            let observed: Vec<String> =
                rows.iter().filter_map(|row| row[field].as_category()).collect();
            let mode = mode_of(&observed).ok_or_else(|| FraudError::TrainingData {
                reason: format!("categorical field '{field}' has no observed values"),
            })?;
            fill.categorical.insert(field.to_string(), mode);
            category_encoders.insert(field.to_string(), CategoryEncoder::fit(observed));
        }

        for field in schema.fields_of(FieldKind::Date) {
            let mut dates = Vec::with_capacity(rows.len());
            for row in rows {
                if let Some(d) = date_value(field, &row[field])? {
                    dates.push(d);
                }
            }
            for part in DatePart::ALL {
                let column = ColumnSource::DatePart { field: field.to_string(), part };
                let values: Vec<f64> = dates.iter().map(|d| date_part(d, part)).collect();
                fill.date_parts
                    .insert(column.column_name(), mean_or_zero(&column.column_name(), &values));
            }
        }

        let table = EncoderTable {
            columns: schema.columns(),
            schema,
            category_encoders,
            fill,
        };

        let unscaled = rows
            .iter()
            .enumerate()
            .map(|(i, row)| encode_unscaled(&table, row, i))
            .collect::<FraudResult<Matrix>>()?;
        let scaler = Scaler::fit(table.column_names(), &unscaled)?;

        log::info!(
            "encoder: fitted on {} rows, {} columns, {} categorical encoders",
            rows.len(),
            table.columns.len(),
            table.category_encoders.len()
        );

        Ok(Self { table, scaler })
    }

    /// Reassemble an encoder from persisted parts.
    pub fn from_parts(table: EncoderTable, scaler: Scaler) -> FraudResult<Self> {
        table.validate()?;
        scaler.validate()?;
        if scaler.columns != table.column_names() {
            return Err(FraudError::ColumnMismatch {
                expected: table.columns.len(),
                actual: scaler.columns.len(),
            });
        }
        Ok(Self { table, scaler })
    }

    pub fn table(&self) -> &EncoderTable {
        &self.table
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn feature_count(&self) -> usize {
        self.table.columns.len()
    }

    pub fn columns(&self) -> Vec<String> {
        self.table.column_names()
    }

    pub fn transform(&self, rows: &[RawRecord]) -> FraudResult<Matrix> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| self.transform_row(row, i))
            .collect()
    }

    pub fn transform_one(&self, row: &RawRecord) -> FraudResult<FeatureVector> {
        self.transform_row(row, 0)
    }

    /// Scale an already-extracted, unscaled feature vector. Every value
    /// must be finite.
    pub fn scale_features(&self, features: &[f64]) -> FraudResult<FeatureVector> {
        let expected = self.feature_count();
        if features.len() != expected {
            return Err(FraudError::FeatureCount { expected, actual: features.len() });
        }
        if let Some((idx, value)) = features.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(FraudError::MalformedValue {
                field: self.table.columns[idx].column_name(),
                value: value.to_string(),
            });
        }
        self.scaler.transform(features)
    }

    fn transform_row(&self, row: &RawRecord, row_idx: usize) -> FraudResult<FeatureVector> {
        let unscaled = encode_unscaled(&self.table, row, row_idx)?;
        check_width(self.feature_count(), unscaled.len())?;
        self.scaler.transform(&unscaled)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn encode_unscaled(table: &EncoderTable, row: &RawRecord, row_idx: usize) -> FraudResult<FeatureVector> {
    let get = |field: &str| {
        row.get(field).ok_or_else(|| FraudError::MissingField {
            field: field.to_string(),
            row: row_idx,
        })
    };

    let mut out = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let value = match column {
            ColumnSource::Numeric { field } => match numeric_value(field, get(field.as_str())?)? {
                Some(v) => v,
                None => fill_lookup(&table.fill.numeric, field)?,
            },
            ColumnSource::Categorical { field } => {
                let label = match get(field.as_str())?.as_category() {
                    Some(label) => label,
                    None => table
                        .fill
                        .categorical
                        .get(field)
                        .cloned()
                        .ok_or_else(|| missing_fitted_state(field))?,
                };
                let encoder = table
                    .category_encoders
                    .get(field)
                    .ok_or_else(|| missing_fitted_state(field))?;
                encoder.encode(field, &label)? as f64
            }
            ColumnSource::DatePart { field, part } => match date_value(field, get(field.as_str())?)? {
                Some(d) => date_part(&d, *part),
                None => fill_lookup(&table.fill.date_parts, &column.column_name())?,
            },
        };
        out.push(value);
    }
    Ok(out)
}

fn numeric_value(field: &str, value: &FieldValue) -> FraudResult<Option<f64>> {
    if value.is_missing() {
        return Ok(None);
    }
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(FraudError::MalformedValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn date_value(field: &str, value: &FieldValue) -> FraudResult<Option<NaiveDate>> {
    match value {
        FieldValue::Missing => Ok(None),
        FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|_| FraudError::MalformedValue {
                field: field.to_string(),
                value: s.clone(),
            }),
        other => Err(FraudError::MalformedValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

fn date_part(date: &NaiveDate, part: DatePart) -> f64 {
    match part {
        DatePart::Year => date.year() as f64,
        DatePart::Month => date.month() as f64,
        DatePart::Day => date.day() as f64,
    }
}

fn mean_or_zero(column: &str, values: &[f64]) -> f64 {
    if values.is_empty() {
        log::warn!("encoder: column '{column}' has no observed values, imputing 0.0");
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Most frequent label; ties go to the smallest label.
fn mode_of(values: &[String]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string())
}

fn fill_lookup(map: &BTreeMap<String, f64>, key: &str) -> FraudResult<f64> {
    map.get(key).copied().ok_or_else(|| missing_fitted_state(key))
}

fn missing_fitted_state(field: &str) -> FraudError {
    FraudError::Other(anyhow::anyhow!("encoder has no fitted state for '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_follow_sorted_order() {
        let enc = CategoryEncoder::fit(["OH", "IL", "IN", "OH"]);
        assert_eq!(enc.labels(), ["IL", "IN", "OH"]);
        assert_eq!(enc.encode("policy_state", "IN").unwrap(), 1);
        assert_eq!(enc.decode(2), Some("OH"));
    }

    #[test]
    fn unknown_label_has_no_code() {
        let enc = CategoryEncoder::fit(["YES", "NO"]);
        let err = enc.encode("property_damage", "MAYBE").unwrap_err();
        match err {
            FraudError::UnknownCategory { field, value } => {
                assert_eq!(field, "property_damage");
                assert_eq!(value, "MAYBE");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mode_breaks_ties_on_smallest_label() {
        let values: Vec<String> = ["b", "a", "b", "a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(mode_of(&values).as_deref(), Some("a"));
    }

    #[test]
    fn constant_column_gets_unit_std() {
        let matrix = vec![vec![3.0, 1.0], vec![3.0, 2.0], vec![3.0, 3.0]];
        let scaler = Scaler::fit(vec!["a".into(), "b".into()], &matrix).unwrap();
        assert_eq!(scaler.std[0], 1.0);
        assert_eq!(scaler.transform(&[3.0, 2.0]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let scaler = Scaler::fit(vec!["a".into()], &[vec![1.0], vec![2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0, 2.0]),
            Err(FraudError::ColumnMismatch { expected: 1, actual: 2 })
        ));
    }
}
