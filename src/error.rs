use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Column not found in dataset: {0}")]
    MissingColumn(String),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Model not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("{0}")]
    Prediction(String),

    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Data validation failed: {0}")]
    ValidationFailed(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Experiment tracking error: {0}")]
    Tracking(String),

    #[error("Training timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Training job {0} not found")]
    JobNotFound(u64),

    #[error("Training job {0} is already running")]
    JobInProgress(u64),
}

impl PipelineError {
    /// True for the error kind the serving layer turns into "train first" guidance.
    pub fn is_model_missing(&self) -> bool {
        matches!(self, PipelineError::ModelNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
