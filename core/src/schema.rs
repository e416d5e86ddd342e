//! Field schema: which raw claim fields feed the encoder, and how.
//!
//! RULE: The encoded column order is derived from this schema and
//! nothing else. Numeric and categorical fields keep their declaration
//! order; date fields are appended at the end as `<field>_year`,
//! `<field>_month`, `<field>_day`. Identifier fields are dropped.

use crate::error::{FraudError, FraudResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Categorical,
    /// `YYYY-MM-DD`, decomposed into three integer columns.
    Date,
    /// Carried in the dataset but never used as signal.
    Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    pub const ALL: [DatePart; 3] = [DatePart::Year, DatePart::Month, DatePart::Day];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

/// Where an encoded column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ColumnSource {
    Numeric { field: String },
    Categorical { field: String },
    DatePart { field: String, part: DatePart },
}

impl ColumnSource {
    pub fn column_name(&self) -> String {
        match self {
            Self::Numeric { field } | Self::Categorical { field } => field.clone(),
            Self::DatePart { field, part } => format!("{field}_{}", part.suffix()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> FraudResult<Self> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// The insurance claims dataset layout.
    pub fn insurance_claims() -> Self {
        use FieldKind::*;
        let fields = [
            ("months_as_customer", Numeric),
            ("age", Numeric),
            ("policy_number", Identifier),
            ("policy_bind_date", Date),
            ("policy_state", Categorical),
            ("policy_csl", Categorical),
            ("policy_deductable", Numeric),
            ("policy_annual_premium", Numeric),
            ("umbrella_limit", Numeric),
            ("insured_zip", Numeric),
            ("insured_sex", Categorical),
            ("insured_education_level", Categorical),
            ("insured_occupation", Categorical),
            ("insured_hobbies", Categorical),
            ("insured_relationship", Categorical),
            ("capital-gains", Numeric),
            ("capital-loss", Numeric),
            ("incident_date", Date),
            ("incident_type", Categorical),
            ("collision_type", Categorical),
            ("incident_severity", Categorical),
            ("authorities_contacted", Categorical),
            ("incident_state", Categorical),
            ("incident_city", Categorical),
            ("incident_location", Categorical),
            ("incident_hour_of_the_day", Numeric),
            ("number_of_vehicles_involved", Numeric),
            ("property_damage", Categorical),
            ("bodily_injuries", Numeric),
            ("witnesses", Numeric),
            ("police_report_available", Categorical),
            ("total_claim_amount", Numeric),
            ("injury_claim", Numeric),
            ("property_claim", Numeric),
            ("vehicle_claim", Numeric),
            ("auto_make", Categorical),
            ("auto_model", Categorical),
            ("auto_year", Numeric),
            ("_c39", Identifier),
        ];
        Self {
            fields: fields
                .iter()
                .map(|(name, kind)| FieldSpec::new(name, *kind))
                .collect(),
        }
    }

    pub fn validate(&self) -> FraudResult<()> {
        let mut seen = BTreeSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(FraudError::TrainingData {
                    reason: format!("field '{}' declared twice in schema", f.name),
                });
            }
        }
        if self.columns().is_empty() {
            return Err(FraudError::TrainingData {
                reason: "schema has no predictive fields".into(),
            });
        }
        Ok(())
    }

    pub fn fields_of(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.name.as_str())
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.kind)
    }

    /// Fields that must be present as keys in every raw record.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.kind != FieldKind::Identifier)
            .map(|f| f.name.as_str())
    }

    /// Encoded column layout, in vector order.
    pub fn columns(&self) -> Vec<ColumnSource> {
        let mut columns: Vec<ColumnSource> = self
            .fields
            .iter()
            .filter_map(|f| match f.kind {
                FieldKind::Numeric => Some(ColumnSource::Numeric { field: f.name.clone() }),
                FieldKind::Categorical => {
                    Some(ColumnSource::Categorical { field: f.name.clone() })
                }
                FieldKind::Date | FieldKind::Identifier => None,
            })
            .collect();

        for field in self.fields_of(FieldKind::Date) {
            for part in DatePart::ALL {
                columns.push(ColumnSource::DatePart { field: field.to_string(), part });
            }
        }
        columns
    }

    pub fn feature_count(&self) -> usize {
        let count = |k| self.fields_of(k).count();
        count(FieldKind::Numeric) + count(FieldKind::Categorical) + 3 * count(FieldKind::Date)
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::insurance_claims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insurance_layout_width() {
        let schema = FeatureSchema::insurance_claims();
        // 17 numeric + 18 categorical + 2 dates x 3 parts
        assert_eq!(schema.feature_count(), 41);
        assert_eq!(schema.columns().len(), schema.feature_count());
    }

    #[test]
    fn date_parts_are_appended_last() {
        let schema = FeatureSchema::insurance_claims();
        let names: Vec<String> = schema.columns().iter().map(|c| c.column_name()).collect();
        let tail = &names[names.len() - 6..];
        assert_eq!(
            tail,
            [
                "policy_bind_date_year",
                "policy_bind_date_month",
                "policy_bind_date_day",
                "incident_date_year",
                "incident_date_month",
                "incident_date_day",
            ]
        );
        assert!(!names.iter().any(|n| n == "policy_number" || n == "_c39"));
    }

    #[test]
    fn duplicate_field_rejected() {
        let fields = vec![
            FieldSpec::new("age", FieldKind::Numeric),
            FieldSpec::new("age", FieldKind::Categorical),
        ];
        assert!(FeatureSchema::new(fields).is_err());
    }
}
