use thiserror::Error;

#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Dataset is empty: {context}")]
    EmptyDataset { context: String },

    #[error("Required field '{field}' missing from row {row}")]
    MissingField { field: String, row: usize },

    #[error("Unknown category for field '{field}': '{value}' was not seen at fit time")]
    UnknownCategory { field: String, value: String },

    #[error("Column mismatch: expected {expected} columns, got {actual}")]
    ColumnMismatch { expected: usize, actual: usize },

    #[error("Training data error: {reason}")]
    TrainingData { reason: String },

    #[error("Artifact load failed for '{piece}': {reason}")]
    ArtifactLoad { piece: String, reason: String },

    #[error("Expected {expected} features, but got {actual} features")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Malformed value for field '{field}': '{value}'")]
    MalformedValue { field: String, value: String },

    #[error("Invalid claim: {reason}")]
    InvalidClaim { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FraudError {
    /// Stable snake_case discriminant for structured failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyDataset { .. } => "empty_dataset",
            Self::MissingField { .. } => "missing_field",
            Self::UnknownCategory { .. } => "unknown_category",
            Self::ColumnMismatch { .. } => "column_mismatch",
            Self::TrainingData { .. } => "training_data",
            Self::ArtifactLoad { .. } => "artifact_load",
            Self::FeatureCount { .. } => "feature_count",
            Self::MalformedValue { .. } => "malformed_value",
            Self::InvalidClaim { .. } => "invalid_claim",
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "internal",
        }
    }

    /// True when the caller sent bad input; false for system faults.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::UnknownCategory { .. }
                | Self::FeatureCount { .. }
                | Self::MalformedValue { .. }
                | Self::InvalidClaim { .. }
        )
    }
}

pub type FraudResult<T> = Result<T, FraudError>;
