//! Target label encoder: the two fraud classes as 0 / 1.

use crate::{
    error::{FraudError, FraudResult},
    types::ClassLabel,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEncoder {
    /// Encoded as 0.
    pub negative: String,
    /// Encoded as 1.
    pub positive: String,
}

impl TargetEncoder {
    pub fn new(negative: impl Into<String>, positive: impl Into<String>) -> FraudResult<Self> {
        let enc = Self { negative: negative.into(), positive: positive.into() };
        enc.validate()?;
        Ok(enc)
    }

    pub fn validate(&self) -> FraudResult<()> {
        if self.negative.is_empty() || self.positive.is_empty() || self.negative == self.positive {
            return Err(FraudError::TrainingData {
                reason: format!(
                    "target classes must be two distinct labels, got '{}' and '{}'",
                    self.negative, self.positive
                ),
            });
        }
        Ok(())
    }

    pub fn encode(&self, label: &str) -> FraudResult<ClassLabel> {
        match label.trim() {
            l if l == self.negative => Ok(0),
            l if l == self.positive => Ok(1),
            other => Err(FraudError::TrainingData {
                reason: format!(
                    "label '{other}' is neither '{}' nor '{}'",
                    self.negative, self.positive
                ),
            }),
        }
    }

    pub fn encode_all(&self, labels: &[String]) -> FraudResult<Vec<ClassLabel>> {
        labels.iter().map(|l| self.encode(l)).collect()
    }

    pub fn decode(&self, class: ClassLabel) -> &str {
        if class == 0 { &self.negative } else { &self.positive }
    }
}
