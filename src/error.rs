use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Reduction errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong between opening the CSV log and writing the
/// last reduced curve.
///
/// `NotFound`, `Parse` and `UnorderedAngles` are structural and abort the
/// whole run. `Division` only aborts the sample it names.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// The input log does not exist. The message is part of the external
    /// contract and must not change.
    #[error("The csv file {path} doesn't exist")]
    NotFound { path: String },

    /// Malformed row or header.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Angles of one sample are not strictly increasing.
    #[error("Sample '{sample}': angle at line {line} is not strictly increasing")]
    UnorderedAngles { sample: String, line: usize },

    /// Zero monitor count or another degenerate normalization.
    #[error("Sample '{sample}': {message}")]
    Division { sample: String, message: String },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReduceError {
    /// Whether the error only concerns one sample, leaving the others free to
    /// be reduced.
    pub fn is_per_sample(&self) -> bool {
        matches!(self, ReduceError::Division { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReduceError>;
