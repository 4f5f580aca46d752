//! Error types for the experiment harness.

use tdadp_core::TdadpError;
use thiserror::Error;

/// Errors that abort an experiment.
#[derive(Debug, Error)]
pub enum SimError {
    /// Generation parameters cannot be satisfied
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// A run failed inside the engine
    #[error("Engine error: {0}")]
    Engine(#[from] TdadpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or unreadable dataset file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unknown scenario name
    #[error("Scenario error: {0}")]
    Scenario(String),
}

impl SimError {
    /// Creates a dataset error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }
}

/// Result alias used across the harness.
pub type Result<T> = std::result::Result<T, SimError>;
