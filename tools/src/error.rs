//! Structured error envelopes: the Tool Adapter never
//! lets an exception escape. Every tool function returns a [`ToolResult`];
//! [`finish`] collapses it into the wire shape agents see, success or
//! failure, with `is_error` set on the latter.

use serde::Serialize;
use serde_json::{json, Value};

use common::error::MemoryError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: &'static str,
    pub message: String,
    pub recovery_hint: Option<String>,
}

impl ToolError {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: "invalid_input",
            message: message.into(),
            recovery_hint: None,
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: "not_found",
            message: message.into(),
            recovery_hint: None,
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: "internal",
            message: message.into(),
            recovery_hint: None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "is_error": true,
            "error": {
                "kind": self.kind,
                "message": self.message,
                "recovery_hint": self.recovery_hint,
            }
        })
    }
}

impl From<MemoryError> for ToolError {
    /// One-sentence user message plus a recovery hint for the kinds that
    /// are retryable or otherwise recoverable without caller changes.
    fn from(err: MemoryError) -> Self {
        let (kind, recovery_hint): (&'static str, Option<&'static str>) = match &err {
            MemoryError::InvalidInput(_) => ("invalid_input", None),
            MemoryError::NotFound(_) => ("not_found", None),
            MemoryError::AlreadyExists(_) => {
                ("already_exists", Some("the relation is already in the desired state"))
            }
            MemoryError::TransactionConflict(_) => {
                ("transaction_conflict", Some("safe to retry once"))
            }
            MemoryError::Transport(_) => {
                ("transport_error", Some("storage session is reconnecting; retry shortly"))
            }
            MemoryError::Embedding(_) => ("embedding_error", None),
            MemoryError::Timeout(_) => ("timeout", Some("retry with a longer deadline")),
            MemoryError::Internal(_) => ("internal", None),
        };

        Self {
            kind,
            message: err.to_string(),
            recovery_hint: recovery_hint.map(str::to_string),
        }
    }
}

pub type ToolResult = Result<Value, ToolError>;

/// Collapses a [`ToolResult`] into the JSON value the protocol layer
/// sends back, whichever branch it took.
pub fn finish(result: ToolResult) -> Value {
    match result {
        Ok(value) => value,
        Err(err) => err.to_json(),
    }
}
