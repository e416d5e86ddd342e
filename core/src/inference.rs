//! Inference service: one loaded bundle, many single-claim predictions.
//!
//! The bundle is loaded once and shared read-only behind an `Arc`; every
//! call is independent. Failures come back as `FraudError`, which the
//! boundary turns into an `ErrorResponse`. A probability is never
//! fabricated for a claim that could not be scored.

use crate::{
    artifact::ArtifactBundle,
    claim::ClaimRecord,
    classifier::Classifier,
    error::{FraudError, FraudResult},
    risk::{self, RiskFactor},
    types::RawRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use uuid::Uuid;

/// Probability strictly above which a claim is flagged.
pub const FRAUD_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub claim_id: Uuid,
    pub fraud_probability: f64,
    pub is_fraudulent: bool,
    pub risk_factors: Vec<RiskFactor>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    fn new(fraud_probability: f64, risk_factors: Vec<RiskFactor>) -> Self {
        Self {
            claim_id: Uuid::new_v4(),
            fraud_probability,
            is_fraudulent: fraud_probability > FRAUD_THRESHOLD,
            risk_factors,
            timestamp: Utc::now(),
        }
    }
}

/// Structured failure returned in place of a prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_kind: String,
    pub message: String,
    pub input_error: bool,
}

impl From<&FraudError> for ErrorResponse {
    fn from(err: &FraudError) -> Self {
        Self {
            error_kind: err.kind().to_string(),
            message: err.to_string(),
            input_error: err.is_input_error(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceService {
    bundle: Arc<ArtifactBundle>,
}

impl InferenceService {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self { bundle }
    }

    /// Load a bundle from disk. Any missing or inconsistent piece fails here,
    /// before the first request.
    pub fn load(dir: impl AsRef<Path>) -> FraudResult<Self> {
        Ok(Self::new(Arc::new(ArtifactBundle::load(dir)?)))
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn feature_count(&self) -> usize {
        self.bundle.encoder().feature_count()
    }

    pub fn predict_one(&self, claim: &ClaimRecord) -> FraudResult<PredictionResult> {
        claim.validate()?;
        let probability = self.score_record(&claim.to_raw())?;
        let result = PredictionResult::new(probability, risk::assess(claim, probability));
        log::debug!(
            "inference: claim {} p={:.4} flagged={} factors={}",
            result.claim_id,
            probability,
            result.is_fraudulent,
            result.risk_factors.len()
        );
        Ok(result)
    }

    /// Score a keyed record directly. Claim rules need typed fields, so
    /// only the model-score annotation applies.
    pub fn predict_record(&self, record: &RawRecord) -> FraudResult<PredictionResult> {
        let probability = self.score_record(record)?;
        Ok(PredictionResult::new(probability, risk::model_only(probability).into_iter().collect()))
    }

    /// Score an unscaled feature vector in encoded column order.
    pub fn predict_features(&self, features: &[f64]) -> FraudResult<PredictionResult> {
        let scaled = self.bundle.encoder().scale_features(features)?;
        let probability = self.probability(scaled)?;
        Ok(PredictionResult::new(probability, risk::model_only(probability).into_iter().collect()))
    }

    fn score_record(&self, record: &RawRecord) -> FraudResult<f64> {
        let row = self.bundle.encoder().transform_one(record)?;
        self.probability(row)
    }

    fn probability(&self, row: Vec<f64>) -> FraudResult<f64> {
        let probs = self.bundle.classifier().predict_proba(&[row])?;
        probs.first().copied().ok_or_else(|| {
            FraudError::Other(anyhow::anyhow!("classifier returned no output row"))
        })
    }
}
