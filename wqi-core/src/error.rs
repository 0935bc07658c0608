/// Error types for the index computation engine
use thiserror::Error;

/// Main error type for engine operations.
///
/// Row-level problems never surface here; they are collected as
/// [`crate::result::RowError`]s alongside successful rows.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed tabular structure (no columns, no data rows, bad catalog)
    #[error("Invalid input: {0}")]
    Input(String),

    /// Failed to parse CSV data
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// Failed to parse a JSON document (formula, configuration)
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Formula definition violates its invariants
    #[error("Invalid formula: {0}")]
    Validation(String),

    /// Unknown formula, upload, or an upload without results
    #[error("{0}")]
    NotFound(String),

    /// Failure reported by a formula source or result store
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Coarse error category, used by hosts to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Validation,
    NotFound,
    Storage,
}

impl EngineError {
    /// Recover an engine error carried through `anyhow` by a storage layer,
    /// wrapping anything else as [`EngineError::Storage`].
    pub fn from_storage(err: anyhow::Error) -> EngineError {
        match err.downcast::<EngineError>() {
            Ok(engine) => engine,
            Err(other) => EngineError::Storage(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Input(_) | EngineError::CsvParse(_) | EngineError::JsonParse(_) => {
                ErrorKind::Input
            }
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Type alias for Results using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
