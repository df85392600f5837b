//! Error types for Tuneline Core.

use thiserror::Error;
use tuneline_abstraction::ModelError;
use tuneline_training::TrainingError;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage URI and mirroring errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stage graph declaration errors
    #[error("Pipeline graph error: {0}")]
    Graph(String),

    /// Data, formatting and fine-tuning errors
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// Generator construction errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A fatal error inside one stage
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl PipelineError {
    /// Wrap `err` with the name of the stage it came from.
    pub fn in_stage(stage: &str, err: impl Into<Self>) -> Self {
        Self::Stage { stage: stage.to_string(), source: Box::new(err.into()) }
    }

    /// Name of the failing stage, if this is a stage error.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
