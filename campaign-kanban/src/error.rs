//! Error types for the board engine

use crate::api::ApiError;
use crate::notify::Severity;
use thiserror::Error;

/// Result type for board operations
pub type Result<T> = std::result::Result<T, KanbanError>;

/// Errors that can occur in board operations
#[derive(Debug, Error)]
pub enum KanbanError {
    /// A drop references a task, column or index the board does not have
    #[error("invalid drag state: {reason}")]
    InvalidDragState { reason: String },

    /// A persistence call was rejected
    #[error("{op} failed: {source}")]
    Persistence {
        op: String,
        #[source]
        source: ApiError,
    },

    /// Two entities share an id
    #[error("duplicate {item_type} ID: {id}")]
    DuplicateIdentifier { item_type: String, id: String },

    /// Task not found
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// Column not found
    #[error("column not found: {id}")]
    ColumnNotFound { id: String },

    /// Column is at its WIP limit
    #[error("column '{id}' is full ({limit} tasks)")]
    ColumnFull { id: String, limit: usize },

    /// A drag gesture is already in flight
    #[error("a drag is already in progress")]
    DragInProgress,

    /// A drop arrived without a drag
    #[error("no drag in progress")]
    NoDragInProgress,

    /// Board structure violates an invariant
    #[error("inconsistent board: {message}")]
    Inconsistent { message: String },

    /// Configuration could not be loaded
    #[error("configuration error: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KanbanError {
    /// Create an invalid drag state error
    pub fn invalid_drag(reason: impl Into<String>) -> Self {
        Self::InvalidDragState {
            reason: reason.into(),
        }
    }

    /// Create a duplicate ID error
    pub fn duplicate_id(item_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            item_type: item_type.into(),
            id: id.into(),
        }
    }

    /// Create an inconsistent board error
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }

    /// Wrap a rejected persistence call
    pub fn persistence(op: impl Into<String>, source: ApiError) -> Self {
        Self::Persistence {
            op: op.into(),
            source,
        }
    }

    /// Severity used when this error is shown to the user
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidDragState { .. }
            | Self::ColumnFull { .. }
            | Self::DragInProgress
            | Self::NoDragInProgress => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Check if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { source, .. } if source.is_retryable())
    }
}

impl From<figment::Error> for KanbanError {
    fn from(err: figment::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KanbanError::TaskNotFound {
            id: "abc123".into(),
        };
        assert_eq!(err.to_string(), "task not found: abc123");
    }

    #[test]
    fn test_persistence_display_names_op() {
        let err = KanbanError::persistence("delete task", ApiError::transport("connection reset"));
        assert!(err.to_string().starts_with("delete task failed"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_severity() {
        assert_eq!(KanbanError::invalid_drag("x").severity(), Severity::Warning);
        assert_eq!(KanbanError::duplicate_id("task", "t1").severity(), Severity::Error);
    }

    #[test]
    fn test_retryable() {
        let timeout = ApiError::Timeout { elapsed_ms: 10 };
        assert!(KanbanError::persistence("move task", timeout).is_retryable());
        assert!(!KanbanError::persistence("move task", ApiError::rejected("bad")).is_retryable());
        assert!(!KanbanError::DragInProgress.is_retryable());
    }
}
