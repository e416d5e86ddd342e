//! Shared fixtures: a synthetic, labelled claims dataset with a learnable
//! fraud signal, written as CSV in the insurance dataset layout.

#![allow(dead_code)]

use claimfraud_core::{
    claim::ClaimRecord,
    config::FraudConfig,
    dataset::Dataset,
    rng::StreamRng,
    schema::FeatureSchema,
};
use std::path::{Path, PathBuf};

pub const LABEL_COLUMN: &str = "fraud_reported";

/// `n` claims, one in four fraudulent. Fraud rows skew towards large
/// amounts, major damage and missing police reports. Every category a
/// default `ClaimRecord` carries appears many times.
pub fn synthetic_claims(n: usize, seed: u64) -> (Vec<ClaimRecord>, Vec<String>) {
    let mut rng = StreamRng::new(seed, 99);
    let mut claims = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);

    for i in 0..n {
        let fraud = i % 4 == 0;
        let amount = if fraud {
            45_000.0 + rng.next_f64() * 30_000.0
        } else {
            5_000.0 + rng.next_f64() * 30_000.0
        };
        let mut claim = ClaimRecord::with_amount(amount.round());

        claim.age = 20 + (i % 50) as i64;
        claim.months_as_customer = 6 + (i % 300) as i64;
        claim.policy_bind_date = format!("20{:02}-{:02}-{:02}", 5 + i % 10, 1 + i % 12, 1 + i % 28);
        claim.incident_date = format!("2015-{:02}-{:02}", 1 + i % 3, 1 + i % 28);
        claim.incident_hour_of_the_day = (i % 24) as i64;
        claim.bodily_injuries = (i % 3) as i64;
        claim.witnesses = (i % 4) as i64;
        claim.number_of_vehicles_involved = 1 + (i % 4) as i64;

        claim.incident_severity = if fraud && rng.chance(0.8) {
            "Major Damage".into()
        } else {
            ["Minor Damage", "Total Loss", "Trivial Damage", "Minor Damage"][i % 4].into()
        };
        claim.police_report_available = if fraud || i % 2 == 0 { "NO" } else { "YES" }.into();
        claim.property_damage = ["NO", "YES"][i % 2].into();
        claim.insured_hobbies = ["reading", "golf", "chess"][i % 3].into();
        claim.incident_city = ["Los Angeles", "Columbus", "Springfield"][i % 3].into();
        claim.auto_make = ["Honda", "Toyota", "Ford"][i % 3].into();
        claim.auto_model = ["Civic", "Camry", "F150"][i % 3].into();
        claim.injury_claim = (amount * 0.2).round();
        claim.property_claim = (amount * 0.1).round();
        claim.vehicle_claim = (amount * 0.7).round();

        claims.push(claim);
        labels.push(if fraud { "Y" } else { "N" }.to_string());
    }
    (claims, labels)
}

/// Write claims as CSV with every insurance-dataset column plus the label.
pub fn write_claims_csv(path: &Path, claims: &[ClaimRecord], labels: &[String]) {
    let schema = FeatureSchema::insurance_claims();
    let mut writer = csv::Writer::from_path(path).unwrap();

    let mut header: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    header.push(LABEL_COLUMN);
    writer.write_record(&header).unwrap();

    for (i, (claim, label)) in claims.iter().zip(labels).enumerate() {
        let raw = claim.to_raw();
        let mut row: Vec<String> = schema
            .fields
            .iter()
            .map(|f| match f.name.as_str() {
                "policy_number" => format!("{}", 100_000 + i),
                "_c39" => String::new(),
                name => raw.get(name).map(|v| v.to_string()).unwrap_or_default(),
            })
            .collect();
        row.push(label.clone());
        writer.write_record(&row).unwrap();
    }
    writer.flush().unwrap();
}

/// Synthetic CSV in `dir`; returns its path.
pub fn claims_csv(dir: &Path, n: usize, seed: u64) -> PathBuf {
    let (claims, labels) = synthetic_claims(n, seed);
    let path = dir.join("claims.csv");
    write_claims_csv(&path, &claims, &labels);
    path
}

/// In-memory dataset over the default insurance schema.
pub fn claims_dataset(n: usize, seed: u64) -> Dataset {
    let (claims, labels) = synthetic_claims(n, seed);
    Dataset::new(claims.iter().map(ClaimRecord::to_raw).collect(), labels).unwrap()
}

/// Test config writing its artifacts under `dir`.
pub fn test_config(dir: &Path) -> FraudConfig {
    let mut config = FraudConfig::default_test();
    config.artifact_dir = dir.join("models");
    config
}

/// Insurance schema without `insured_zip` and `auto_year`: 39 columns.
pub fn narrow_schema() -> FeatureSchema {
    let mut schema = FeatureSchema::insurance_claims();
    schema.fields.retain(|f| f.name != "insured_zip" && f.name != "auto_year");
    schema
}
