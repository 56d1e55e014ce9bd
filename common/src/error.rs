use thiserror::Error;

/// A small set of kinds callers can match on, rather than the raw
/// transport/database error.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<surrealdb::Error> for MemoryError {
    /// Classifies a raw storage error into a taxonomy kind by matching on
    /// substrings of the engine's own error message. Fragile, but the
    /// engine doesn't expose typed error codes, so this is the only signal
    /// available short of parsing the statement that produced it.
    fn from(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already exists") || message.contains("already contains") {
            MemoryError::AlreadyExists(message)
        } else if message.contains("Transaction conflict")
            || message.contains("read or write conflict")
        {
            MemoryError::TransactionConflict(message)
        } else {
            MemoryError::Transport(message)
        }
    }
}

impl From<tokio::time::error::Elapsed> for MemoryError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        MemoryError::Timeout(err.to_string())
    }
}

impl MemoryError {
    /// True for kinds callers can treat as a soft failure (the relation
    /// already being in the desired state, or a conflict worth one retry).
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(
            self,
            MemoryError::AlreadyExists(_) | MemoryError::TransactionConflict(_)
        )
    }
}
