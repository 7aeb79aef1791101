//! Error types module
//!
//! All failures surfaced by filestore components are unified under [`AppError`].
//! Every variant folds into one of five kinds (see [`ErrorKind`]); the HTTP status
//! and client-facing presentation are derived through [`ErrorMetadata`] so that the
//! translation to a transport status happens only at the system boundary.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::constants::ErrorCode;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejected reads and disallowed transitions
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// The five failure kinds every caller has to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Forbidden,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::BadRequest => write!(f, "bad_request"),
            ErrorKind::Forbidden => write!(f, "forbidden"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NOT_FOUND" or an operation code)
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rejected by the object store gate (scan status absent or infected).
    #[error("Bad request: {message} ({code})")]
    Rejected { code: ErrorCode, message: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// Object store failure tagged with the operation that failed.
    #[error("Storage error: {message} ({code})")]
    Storage { code: ErrorCode, message: String },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::BadRequest(_) | AppError::Rejected { .. } => ErrorKind::BadRequest,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Database(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. }
            | AppError::Storage { .. } => ErrorKind::Internal,
        }
    }

    /// Operation code carried by storage-originated errors.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Rejected { code, .. } | AppError::Storage { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Errors raised by a nested call that callers must see unchanged.
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::BadRequest
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            false,
            Some("Use a different resource ID"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::Rejected { code, .. } => (
            400,
            code.as_str(),
            false,
            Some("Wait for the antivirus scan to complete"),
            false,
            LogLevel::Warn,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage { code, .. } => (
            500,
            code.as_str(),
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::NotFound(ref msg)
            | AppError::Conflict(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::Forbidden(ref msg) => msg.clone(),
            AppError::Rejected { ref message, .. } => message.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::Storage { .. } => "Failed to access storage".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_folds_variants() {
        assert_eq!(AppError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            AppError::Rejected {
                code: ErrorCode::StatusInfected,
                message: "infected".into()
            }
            .kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            AppError::Storage {
                code: ErrorCode::Save,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Internal
        );
        assert_eq!(AppError::Forbidden("x".into()).kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_pass_through() {
        assert!(AppError::Conflict("dup".into()).is_pass_through());
        assert!(AppError::NotFound("gone".into()).is_pass_through());
        assert!(!AppError::Internal("boom".into()).is_pass_through());
        assert!(!AppError::Forbidden("no".into()).is_pass_through());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).http_status_code(), 404);
        assert_eq!(AppError::Conflict("x".into()).http_status_code(), 409);
        assert_eq!(AppError::BadRequest("x".into()).http_status_code(), 400);
        assert_eq!(AppError::Forbidden("x".into()).http_status_code(), 403);
        assert_eq!(AppError::Internal("x".into()).http_status_code(), 500);
    }

    #[test]
    fn test_storage_error_code_and_message() {
        let err = AppError::Storage {
            code: ErrorCode::Copy,
            message: "copy failed for key a/b".into(),
        };
        assert_eq!(err.error_code(), "binary.data.copy.error");
        assert_eq!(err.code(), Some(ErrorCode::Copy));
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access storage");
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err = AppError::InternalWithSource {
            message: "Error while uploading file".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        let details = err.detailed_message();
        assert!(details.contains("Error while uploading file"));
        assert!(details.contains("Caused by: connection reset"));
    }
}
