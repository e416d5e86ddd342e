//! Insurance-claim fraud detection: feature encoding, a binary classifier,
//! the offline training pipeline and the single-claim inference service.

pub mod artifact;
pub mod claim;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod risk;
pub mod rng;
pub mod schema;
pub mod target;
pub mod training;
pub mod types;

pub use artifact::ArtifactBundle;
pub use claim::ClaimRecord;
pub use classifier::{Classifier, MlpClassifier};
pub use config::FraudConfig;
pub use encoder::FeatureEncoder;
pub use error::{FraudError, FraudResult};
pub use inference::{ErrorResponse, InferenceService, PredictionResult};
pub use training::{TrainingHistory, TrainingPipeline};
