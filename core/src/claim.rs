//! Typed claim record: the validated inference boundary.
//!
//! A ClaimRecord is deserialized once from the caller's JSON, filled
//! with documented defaults, validated, and then converted into the
//! RawRecord the encoder consumes. Risk rules read the typed fields.

use crate::{
    error::{FraudError, FraudResult},
    types::{FieldValue, RawRecord},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const MIN_INSURED_AGE: i64 = 16;
pub const MAX_INSURED_AGE: i64 = 100;

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn default_state() -> String { "CA".into() }
fn default_csl() -> String { "100/300".into() }
fn default_deductable() -> f64 { 500.0 }
fn default_premium() -> f64 { 1000.0 }
fn default_sex() -> String { "MALE".into() }
fn default_education() -> String { "High School".into() }
fn default_occupation() -> String { "Professional".into() }
fn default_relationship() -> String { "Self".into() }
fn default_zip() -> i64 { 90001 }
fn default_months_as_customer() -> i64 { 12 }
fn default_incident_type() -> String { "Single Vehicle Collision".into() }
fn default_collision_type() -> String { "Front Collision".into() }
fn default_severity() -> String { "Minor Damage".into() }
fn default_authorities() -> String { "Police".into() }
fn default_city() -> String { "Los Angeles".into() }
fn default_location() -> String { "Highway".into() }
fn default_vehicles() -> i64 { 1 }
fn default_no() -> String { "NO".into() }
fn default_age() -> i64 { 30 }
fn default_hour() -> i64 { 12 }
fn default_hobbies() -> String { "reading".into() }
fn default_make() -> String { "Honda".into() }
fn default_model() -> String { "Civic".into() }
fn default_auto_year() -> i64 { 2020 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    // Policy
    #[serde(default = "today")]
    pub policy_bind_date: String,
    #[serde(default = "default_state")]
    pub policy_state: String,
    #[serde(default = "default_csl")]
    pub policy_csl: String,
    #[serde(default = "default_deductable")]
    pub policy_deductable: f64,
    #[serde(default = "default_premium")]
    pub policy_annual_premium: f64,
    #[serde(default)]
    pub umbrella_limit: i64,

    // Insured
    #[serde(default = "default_sex")]
    pub insured_sex: String,
    #[serde(default = "default_education")]
    pub insured_education_level: String,
    #[serde(default = "default_occupation")]
    pub insured_occupation: String,
    #[serde(default = "default_relationship")]
    pub insured_relationship: String,
    #[serde(default = "default_zip")]
    pub insured_zip: i64,
    #[serde(default = "default_months_as_customer")]
    pub months_as_customer: i64,
    #[serde(default = "default_age")]
    pub age: i64,
    #[serde(default = "default_hobbies")]
    pub insured_hobbies: String,
    #[serde(default, rename = "capital-gains", alias = "capital_gains")]
    pub capital_gains: f64,
    #[serde(default, rename = "capital-loss", alias = "capital_loss")]
    pub capital_loss: f64,

    // Incident
    #[serde(default = "today")]
    pub incident_date: String,
    #[serde(default = "default_incident_type")]
    pub incident_type: String,
    #[serde(default = "default_collision_type")]
    pub collision_type: String,
    #[serde(default = "default_severity")]
    pub incident_severity: String,
    #[serde(default = "default_authorities")]
    pub authorities_contacted: String,
    #[serde(default = "default_state")]
    pub incident_state: String,
    #[serde(default = "default_city")]
    pub incident_city: String,
    #[serde(default = "default_location")]
    pub incident_location: String,
    #[serde(default = "default_hour")]
    pub incident_hour_of_the_day: i64,
    #[serde(default = "default_vehicles")]
    pub number_of_vehicles_involved: i64,
    #[serde(default = "default_no")]
    pub property_damage: String,

    // Claim amounts
    #[serde(default)]
    pub bodily_injuries: i64,
    #[serde(default)]
    pub witnesses: i64,
    #[serde(default = "default_no")]
    pub police_report_available: String,
    pub total_claim_amount: f64,
    #[serde(default)]
    pub injury_claim: f64,
    #[serde(default)]
    pub property_claim: f64,
    #[serde(default)]
    pub vehicle_claim: f64,

    // Vehicle
    #[serde(default = "default_make")]
    pub auto_make: String,
    #[serde(default = "default_model")]
    pub auto_model: String,
    #[serde(default = "default_auto_year")]
    pub auto_year: i64,
}

impl ClaimRecord {
    /// A claim with every default applied and the given claim amount.
    pub fn with_amount(total_claim_amount: f64) -> Self {
        Self {
            policy_bind_date: today(),
            policy_state: default_state(),
            policy_csl: default_csl(),
            policy_deductable: default_deductable(),
            policy_annual_premium: default_premium(),
            umbrella_limit: 0,
            insured_sex: default_sex(),
            insured_education_level: default_education(),
            insured_occupation: default_occupation(),
            insured_relationship: default_relationship(),
            insured_zip: default_zip(),
            months_as_customer: default_months_as_customer(),
            age: default_age(),
            insured_hobbies: default_hobbies(),
            capital_gains: 0.0,
            capital_loss: 0.0,
            incident_date: today(),
            incident_type: default_incident_type(),
            collision_type: default_collision_type(),
            incident_severity: default_severity(),
            authorities_contacted: default_authorities(),
            incident_state: default_state(),
            incident_city: default_city(),
            incident_location: default_location(),
            incident_hour_of_the_day: default_hour(),
            number_of_vehicles_involved: default_vehicles(),
            property_damage: default_no(),
            bodily_injuries: 0,
            witnesses: 0,
            police_report_available: default_no(),
            total_claim_amount,
            injury_claim: 0.0,
            property_claim: 0.0,
            vehicle_claim: 0.0,
            auto_make: default_make(),
            auto_model: default_model(),
            auto_year: default_auto_year(),
        }
    }

    /// Parse and validate a claim from JSON.
    pub fn from_json(json: &str) -> FraudResult<Self> {
        let claim: ClaimRecord = serde_json::from_str(json).map_err(|e| FraudError::InvalidClaim {
            reason: e.to_string(),
        })?;
        claim.validate()?;
        Ok(claim)
    }

    pub fn validate(&self) -> FraudResult<()> {
        let invalid = |reason: String| Err(FraudError::InvalidClaim { reason });

        if !(self.total_claim_amount > 0.0) {
            return invalid(format!(
                "total claim amount must be positive, got {}",
                self.total_claim_amount
            ));
        }
        if !(MIN_INSURED_AGE..=MAX_INSURED_AGE).contains(&self.age) {
            return invalid(format!(
                "age must be between {MIN_INSURED_AGE} and {MAX_INSURED_AGE}, got {}",
                self.age
            ));
        }
        if !(0..=23).contains(&self.incident_hour_of_the_day) {
            return invalid(format!(
                "hour must be between 0 and 23, got {}",
                self.incident_hour_of_the_day
            ));
        }
        for (field, value) in [
            ("policy_bind_date", &self.policy_bind_date),
            ("incident_date", &self.incident_date),
        ] {
            if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                return Err(FraudError::MalformedValue {
                    field: field.into(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Convert into the keyed form consumed by the encoder.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new();
        let mut text = |k: &str, v: &str| {
            raw.insert(k.to_string(), FieldValue::Text(v.to_string()));
        };
        text("policy_bind_date", &self.policy_bind_date);
        text("policy_state", &self.policy_state);
        text("policy_csl", &self.policy_csl);
        text("insured_sex", &self.insured_sex);
        text("insured_education_level", &self.insured_education_level);
        text("insured_occupation", &self.insured_occupation);
        text("insured_relationship", &self.insured_relationship);
        text("insured_hobbies", &self.insured_hobbies);
        text("incident_date", &self.incident_date);
        text("incident_type", &self.incident_type);
        text("collision_type", &self.collision_type);
        text("incident_severity", &self.incident_severity);
        text("authorities_contacted", &self.authorities_contacted);
        text("incident_state", &self.incident_state);
        text("incident_city", &self.incident_city);
        text("incident_location", &self.incident_location);
        text("property_damage", &self.property_damage);
        text("police_report_available", &self.police_report_available);
        text("auto_make", &self.auto_make);
        text("auto_model", &self.auto_model);

        for (k, v) in [
            ("umbrella_limit", self.umbrella_limit),
            ("insured_zip", self.insured_zip),
            ("months_as_customer", self.months_as_customer),
            ("age", self.age),
            ("incident_hour_of_the_day", self.incident_hour_of_the_day),
            ("number_of_vehicles_involved", self.number_of_vehicles_involved),
            ("bodily_injuries", self.bodily_injuries),
            ("witnesses", self.witnesses),
            ("auto_year", self.auto_year),
        ] {
            raw.insert(k.to_string(), FieldValue::Integer(v));
        }
        for (k, v) in [
            ("policy_deductable", self.policy_deductable),
            ("policy_annual_premium", self.policy_annual_premium),
            ("capital-gains", self.capital_gains),
            ("capital-loss", self.capital_loss),
            ("total_claim_amount", self.total_claim_amount),
            ("injury_claim", self.injury_claim),
            ("property_claim", self.property_claim),
            ("vehicle_claim", self.vehicle_claim),
        ] {
            raw.insert(k.to_string(), FieldValue::Float(v));
        }
        raw
    }
}
