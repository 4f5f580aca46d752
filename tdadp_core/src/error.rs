//! Error types for the truth-discovery engine.

use tdadp_env::{Label, TaskId, WorkerId};
use thiserror::Error;

/// Errors that abort the current run.
///
/// None of these are retried: a run is a deterministic replay, so the caller
/// decides whether to skip the run or abort the whole experiment.
#[derive(Debug, Error)]
pub enum TdadpError {
    /// Malformed or inconsistent input records
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Threshold, probability or size outside its valid range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A record references a worker that does not exist
    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    /// A record references a task that does not exist
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    /// A label outside `0..L`
    #[error("Label {label} out of range for task {task} (label count {label_count})")]
    LabelOutOfRange {
        task: TaskId,
        label: Label,
        label_count: usize,
    },

    /// Internal state contradicts an engine invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl TdadpError {
    /// Creates an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an invariant error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, TdadpError>;
