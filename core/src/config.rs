use crate::{classifier::MlpConfig, schema::FeatureSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Epochs without validation-loss improvement before stopping.
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub model: MlpConfig,
}

fn default_validation_fraction() -> f64 { 0.2 }
fn default_max_epochs() -> usize { 50 }
fn default_batch_size() -> usize { 32 }
fn default_patience() -> usize { 5 }
fn default_seed() -> u64 { 42 }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_fraction: default_validation_fraction(),
            max_epochs: default_max_epochs(),
            batch_size: default_batch_size(),
            patience: default_patience(),
            seed: default_seed(),
            model: MlpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub column: String,
    pub negative: String,
    pub positive: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            column: "fraud_reported".into(),
            negative: "N".into(),
            positive: "Y".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudConfig {
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub schema: FeatureSchema,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            labels: LabelConfig::default(),
            schema: FeatureSchema::default(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

impl FraudConfig {
    /// Load from a JSON config file. Missing sections take defaults.
    /// In tests, use FraudConfig::default_test().
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: FraudConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.training;
        if !(t.validation_fraction > 0.0 && t.validation_fraction < 1.0) {
            anyhow::bail!("validation_fraction must be in (0, 1), got {}", t.validation_fraction);
        }
        if t.max_epochs == 0 || t.batch_size == 0 {
            anyhow::bail!("max_epochs and batch_size must be positive");
        }
        self.schema.validate()?;
        Ok(())
    }

    /// Small, fast settings for tests: tiny network, few epochs.
    pub fn default_test() -> Self {
        Self {
            training: TrainingConfig {
                validation_fraction: 0.25,
                max_epochs: 40,
                batch_size: 16,
                patience: 5,
                seed: 7,
                model: MlpConfig {
                    hidden_layers: vec![8],
                    dropout: 0.0,
                    learning_rate: 0.01,
                },
            },
            ..Self::default()
        }
    }
}
