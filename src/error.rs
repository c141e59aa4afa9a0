//! Structured error types for memo operations.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,
    MalformedTimestamp,
    InvalidTransition,

    // Not found errors
    MemoNotFound,
    SubtaskNotFound,
    TemplateNotFound,
    AttachmentNotFound,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Errors surfaced by the memo core.
///
/// Any of these aborts the enclosing transaction; nothing is retried internally.
#[derive(Debug, Error)]
pub enum MemoError {
    #[error("Memo not found: {0}")]
    MemoNotFound(i64),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(i64),

    #[error("Template not found: {0}")]
    TemplateNotFound(i64),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(i64),

    /// Completing a memo while some of its subtasks are still open.
    #[error("Memo {memo_id} cannot be completed: {incomplete} subtask(s) still incomplete")]
    InvalidTransition { memo_id: i64, incomplete: usize },

    #[error("Malformed timestamp in '{field}': {value}")]
    MalformedTimestamp { field: String, value: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl MemoError {
    pub fn malformed_timestamp(field: &str, value: &str) -> Self {
        Self::MalformedTimestamp {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MemoError::MemoNotFound(_) => ErrorCode::MemoNotFound,
            MemoError::SubtaskNotFound(_) => ErrorCode::SubtaskNotFound,
            MemoError::TemplateNotFound(_) => ErrorCode::TemplateNotFound,
            MemoError::AttachmentNotFound(_) => ErrorCode::AttachmentNotFound,
            MemoError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            MemoError::MalformedTimestamp { .. } => ErrorCode::MalformedTimestamp,
            MemoError::InvalidField { .. } => ErrorCode::InvalidFieldValue,
            MemoError::Database(_) | MemoError::Migration(_) => ErrorCode::DatabaseError,
            MemoError::Serialization(_) | MemoError::LockPoisoned => ErrorCode::InternalError,
        }
    }

    /// True for the NotFound family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::MemoNotFound
                | ErrorCode::SubtaskNotFound
                | ErrorCode::TemplateNotFound
                | ErrorCode::AttachmentNotFound
        )
    }
}

/// Serializable error payload for CLI output.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&MemoError> for ErrorReport {
    fn from(err: &MemoError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type for memo operations.
pub type MemoResult<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InvalidTransition).unwrap();
        assert_eq!(json, "\"INVALID_TRANSITION\"");
    }

    #[test]
    fn not_found_family() {
        assert!(MemoError::MemoNotFound(1).is_not_found());
        assert!(MemoError::SubtaskNotFound(1).is_not_found());
        assert!(!MemoError::LockPoisoned.is_not_found());
        assert!(
            !MemoError::InvalidTransition {
                memo_id: 1,
                incomplete: 2
            }
            .is_not_found()
        );
    }

    #[test]
    fn report_carries_message() {
        let err = MemoError::malformed_timestamp("completed_at", "yesterday");
        let report = ErrorReport::from(&err);
        assert_eq!(report.code, ErrorCode::MalformedTimestamp);
        assert!(report.message.contains("yesterday"));
    }
}
