//! Error types for bikeflow

use thiserror::Error;

/// Errors that can occur while building features or running the model
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Failed to parse value: {0}")]
    ParseError(String),

    #[error("Training record {0} has no target value")]
    MissingTarget(usize),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Model error: {0}")]
    ModelError(String),
}
