//! Rule-based risk annotations attached to a prediction.
//!
//! Rules are evaluated in a fixed order and each fires at most once, so
//! the factor list for a given claim and probability is always the same.

use crate::claim::ClaimRecord;
use serde::{Deserialize, Serialize};

pub const HIGH_CLAIM_AMOUNT: f64 = 50_000.0;
pub const MULTIPLE_INJURIES: i64 = 2;
pub const MULTIPLE_VEHICLES: i64 = 2;
pub const HIGH_RISK_SCORE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub severity: Severity,
    pub description: String,
}

impl RiskFactor {
    fn new(factor: &str, severity: Severity, description: &str) -> Self {
        Self {
            factor: factor.to_string(),
            severity,
            description: description.to_string(),
        }
    }
}

/// All claim rules followed by the model-score rule.
pub fn assess(claim: &ClaimRecord, fraud_probability: f64) -> Vec<RiskFactor> {
    let mut factors = Vec::new();

    if claim.total_claim_amount > HIGH_CLAIM_AMOUNT {
        factors.push(RiskFactor::new(
            "High Claim Amount",
            Severity::High,
            "Total claim amount is unusually high",
        ));
    }

    // One injury factor at most: the stronger rule wins.
    if claim.bodily_injuries > MULTIPLE_INJURIES {
        factors.push(RiskFactor::new(
            "Multiple Injuries",
            Severity::Medium,
            "Multiple people reported injured",
        ));
    } else if claim.bodily_injuries > 0 {
        factors.push(RiskFactor::new(
            "Bodily Injuries",
            Severity::Low,
            "Bodily injuries reported",
        ));
    }

    if claim.police_report_available == "NO" {
        factors.push(RiskFactor::new(
            "No Police Report",
            Severity::Medium,
            "No police report filed",
        ));
    }

    if claim.incident_severity == "Major Damage" {
        factors.push(RiskFactor::new(
            "Major Damage",
            Severity::High,
            "Major damage reported",
        ));
    }

    if claim.number_of_vehicles_involved > MULTIPLE_VEHICLES {
        factors.push(RiskFactor::new(
            "Multiple Vehicles",
            Severity::Medium,
            "Multiple vehicles involved",
        ));
    }

    if claim.property_damage == "YES" {
        factors.push(RiskFactor::new(
            "Property Damage",
            Severity::Low,
            "Property damage reported",
        ));
    }

    factors.extend(model_only(fraud_probability));
    factors
}

/// The model-score rule alone, for inputs that carry no claim fields.
pub fn model_only(fraud_probability: f64) -> Option<RiskFactor> {
    (fraud_probability > HIGH_RISK_SCORE).then(|| {
        RiskFactor::new(
            "High Risk Score",
            Severity::High,
            "ML model indicates high fraud probability",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(factors: &[RiskFactor]) -> Vec<&str> {
        factors.iter().map(|f| f.factor.as_str()).collect()
    }

    #[test]
    fn quiet_claim_has_no_factors() {
        let mut claim = ClaimRecord::with_amount(1_000.0);
        claim.police_report_available = "YES".into();
        assert!(assess(&claim, 0.1).is_empty());
    }

    #[test]
    fn single_injury_is_low_severity() {
        let mut claim = ClaimRecord::with_amount(1_000.0);
        claim.bodily_injuries = 1;
        let factors = assess(&claim, 0.1);
        assert_eq!(names(&factors), vec!["Bodily Injuries", "No Police Report"]);
        assert_eq!(factors[0].severity, Severity::Low);
    }

    #[test]
    fn every_rule_fires_in_order() {
        let mut claim = ClaimRecord::with_amount(75_000.0);
        claim.bodily_injuries = 3;
        claim.incident_severity = "Major Damage".into();
        claim.number_of_vehicles_involved = 4;
        claim.property_damage = "YES".into();
        assert_eq!(
            names(&assess(&claim, 0.95)),
            vec![
                "High Claim Amount",
                "Multiple Injuries",
                "No Police Report",
                "Major Damage",
                "Multiple Vehicles",
                "Property Damage",
                "High Risk Score",
            ]
        );
    }

    #[test]
    fn thresholds_are_strict() {
        let mut claim = ClaimRecord::with_amount(HIGH_CLAIM_AMOUNT);
        claim.police_report_available = "YES".into();
        assert!(assess(&claim, HIGH_RISK_SCORE).is_empty());
    }

    #[test]
    fn severity_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"Medium\"");
    }
}
