//! Error types for the fallible edges of the engine.
//!
//! Graph mutations, connection transitions, history operations and
//! validation are deliberately infallible (bad input degrades to a
//! no-op); only import/export and the repository return errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The imported document carries no recognizable `nodes` array.
    #[error("Invalid workflow format")]
    InvalidFormat,

    /// Repository lookup for an id that has no stored document.
    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
