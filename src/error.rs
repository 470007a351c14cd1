use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while standardizing a dataset or deriving an extraction.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Criteria carried a key outside `attributes`, `filter`, `balance`, `size`.
    #[error("Criteria key not understood: '{0}'")]
    UnknownCriteriaKey(String),

    /// Criteria were well-keyed but inconsistent with the dataset.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Raw dataset root does not exist.
    #[error("Dataset folder not found: {0}")]
    PathNotFound(PathBuf),

    /// No eligible sample was found under the root.
    #[error("Dataset is empty: no eligible samples under {0}")]
    EmptyDataset(PathBuf),

    #[error("Unknown dataset '{name}' (available: {available})")]
    UnknownDataset { name: String, available: String },

    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// A sidecar or descriptor that passed an existence check could not be parsed.
    #[error("Malformed file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// `max == min` for a continuous sub-key kept in the working set.
    #[error("Cannot normalize '{attribute}/{key}': max equals min ({value})")]
    DegenerateFeature {
        attribute: String,
        key: String,
        value: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Artifact encoding error: {0}")]
    Artifact(#[from] bincode::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
