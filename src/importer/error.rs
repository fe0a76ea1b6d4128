// ==========================================
// BOQ Import Engine - System Error Types
// ==========================================
// Tool: thiserror derive
// Row-level problems are never errors here; they are report data.
// ==========================================

use crate::domain::boq::ImportReport;
use thiserror::Error;

/// Fatal (system-level) errors of an import run
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== Source errors =====
    #[error("source file not found: {0}")]
    SourceNotFound(String),

    #[error("unsupported source format: {0} (only .csv is read directly)")]
    UnsupportedFormat(String),

    #[error("failed to read source rows: {0}")]
    SourceRead(String),

    #[error("CSV decoding failed: {0}")]
    CsvParse(String),

    // ===== Configuration errors =====
    #[error("invalid configuration (key: {key}): {message}")]
    Config { key: String, message: String },

    #[error("invalid column mapping (field: {field}): {message}")]
    InvalidMapping { field: String, message: String },

    // ===== Run lifecycle errors =====
    #[error("invalid run state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("chunk {chunk_index} crashed: {message}")]
    ChunkPanicked { chunk_index: usize, message: String },

    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    /// Fatal failure; `report` keeps every chunk completed before it
    #[error("import run failed: {message}")]
    RunFailed {
        message: String,
        report: Box<ImportReport>,
    },

    // ===== Generic =====
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("lock poisoned: {0}")]
    LockError(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Partial report of a failed run, if any
    pub fn partial_report(&self) -> Option<&ImportReport> {
        match self {
            EngineError::RunFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::SourceRead(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::CsvParse(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Result alias
pub type EngineResult<T> = Result<T, EngineError>;
