//! Inference service integration tests: single-claim predictions, risk
//! annotation, the legacy vector path and structured failures.

mod common;

use claimfraud_core::{
    claim::ClaimRecord,
    error::FraudError,
    inference::{ErrorResponse, InferenceService, FRAUD_THRESHOLD},
    risk::{self, Severity},
    training::TrainingPipeline,
};
use std::{path::Path, sync::Arc};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn trained_service(dir: &Path) -> InferenceService {
    let config = common::test_config(dir);
    let csv = common::claims_csv(dir, 160, 31);
    TrainingPipeline::new(config.clone()).train(&csv).unwrap();
    InferenceService::load(&config.artifact_dir).unwrap()
}

fn claim(amount: f64) -> ClaimRecord {
    let mut claim = ClaimRecord::with_amount(amount);
    claim.policy_bind_date = "2009-06-15".into();
    claim.incident_date = "2015-02-11".into();
    claim
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Predicting the same claim twice gives the same probability.
#[test]
fn predict_one_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());
    let claim = claim(18_500.0);

    let a = service.predict_one(&claim).unwrap();
    let b = service.predict_one(&claim).unwrap();
    assert_eq!(a.fraud_probability, b.fraud_probability);
    assert_eq!(a.is_fraudulent, b.is_fraudulent);
    assert_ne!(a.claim_id, b.claim_id);
    assert!((0.0..=1.0).contains(&a.fraud_probability));
    assert_eq!(a.is_fraudulent, a.fraud_probability > FRAUD_THRESHOLD);
}

/// Large claims with major damage score above routine ones.
#[test]
fn fraud_signal_raises_probability() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());

    let mut suspicious = claim(70_000.0);
    suspicious.incident_severity = "Major Damage".into();
    let mut routine = claim(8_000.0);
    routine.incident_severity = "Trivial Damage".into();
    routine.police_report_available = "YES".into();

    let high = service.predict_one(&suspicious).unwrap().fraud_probability;
    let low = service.predict_one(&routine).unwrap().fraud_probability;
    assert!(high > low, "suspicious {high:.4} vs routine {low:.4}");
}

/// 60000 claimed, three injuries, no police report, p = 0.82: exactly
/// four factors, in rule order.
#[test]
fn risk_factors_for_high_risk_claim() {
    let mut claim = claim(60_000.0);
    claim.bodily_injuries = 3;
    claim.police_report_available = "NO".into();

    let factors = risk::assess(&claim, 0.82);
    let summary: Vec<(&str, Severity)> =
        factors.iter().map(|f| (f.factor.as_str(), f.severity)).collect();
    assert_eq!(
        summary,
        vec![
            ("High Claim Amount", Severity::High),
            ("Multiple Injuries", Severity::Medium),
            ("No Police Report", Severity::Medium),
            ("High Risk Score", Severity::High),
        ]
    );
}

/// Service predictions carry the claim rules for typed claims.
#[test]
fn predict_one_attaches_claim_rules() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());
    let mut claim = claim(60_000.0);
    claim.bodily_injuries = 3;

    let result = service.predict_one(&claim).unwrap();
    let names: Vec<&str> = result.risk_factors.iter().map(|f| f.factor.as_str()).collect();
    assert_eq!(&names[..3], ["High Claim Amount", "Multiple Injuries", "No Police Report"]);
    assert_eq!(
        names.contains(&"High Risk Score"),
        result.fraud_probability > risk::HIGH_RISK_SCORE
    );
}

/// A 38-value vector against a 39-column model is a feature count error.
#[test]
fn legacy_vector_width_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.schema = common::narrow_schema();
    let csv = common::claims_csv(dir.path(), 120, 32);
    let (bundle, _) = TrainingPipeline::new(config).train(&csv).unwrap();

    let service = InferenceService::new(Arc::new(bundle));
    assert_eq!(service.feature_count(), 39);

    let err = service.predict_features(&[0.0; 38]).unwrap_err();
    assert!(matches!(err, FraudError::FeatureCount { expected: 39, actual: 38 }));
    assert_eq!(err.to_string(), "Expected 39 features, but got 38 features");

    let ok = service.predict_features(&[0.0; 39]).unwrap();
    assert!((0.0..=1.0).contains(&ok.fraud_probability));
    assert!(ok.risk_factors.len() <= 1);
}

/// Unknown labels come back as a structured input error.
#[test]
fn unknown_category_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());
    let mut claim = claim(9_000.0);
    claim.incident_city = "Atlantis".into();

    let err = service.predict_one(&claim).unwrap_err();
    let response = ErrorResponse::from(&err);
    assert_eq!(response.error_kind, "unknown_category");
    assert!(response.input_error);
    assert!(response.message.contains("Atlantis"));
}

/// Claims that fail validation never reach the model.
#[test]
fn invalid_claim_is_rejected_before_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());

    let mut young = claim(9_000.0);
    young.age = 12;
    assert_eq!(service.predict_one(&young).unwrap_err().kind(), "invalid_claim");

    let mut bad_date = claim(9_000.0);
    bad_date.incident_date = "yesterday".into();
    assert_eq!(service.predict_one(&bad_date).unwrap_err().kind(), "malformed_value");
}

/// Loading from an empty directory fails before serving anything.
#[test]
fn load_fails_fast_on_missing_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let err = InferenceService::load(dir.path()).unwrap_err();
    assert_eq!(err.kind(), "artifact_load");
    assert!(!ErrorResponse::from(&err).input_error);
}

/// A NaN in a legacy vector is an input error, not a probability.
#[test]
fn legacy_vector_with_nan_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = trained_service(dir.path());
    let mut features = vec![0.0; service.feature_count()];
    features[2] = f64::NAN;

    let err = service.predict_features(&features).unwrap_err();
    let response = ErrorResponse::from(&err);
    assert_eq!(response.error_kind, "malformed_value");
    assert!(response.input_error);
}
