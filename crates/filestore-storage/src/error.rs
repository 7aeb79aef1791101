//! Storage error types
//!
//! [`TransportError`] is what a backend reports; [`StorageError`] is what the
//! [`ObjectStoreClient`](crate::ObjectStoreClient) reports after classifying it and
//! tagging it with the operation that failed.

use filestore_core::{AppError, ErrorCode};
use thiserror::Error;

/// Raw failure reported by an object store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("No such key: {0}")]
    NoSuchKey(String),

    /// Connection, timeout, or truncated-body failures. Safe to retry for idempotent calls.
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Object store error: {0}")]
    Service(String),
}

impl TransportError {
    pub fn is_io(&self) -> bool {
        matches!(self, TransportError::Io(_))
    }
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("{message} ({code})")]
    BadRequest { code: ErrorCode, message: String },

    #[error("{message} ({code})")]
    Internal {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StorageError::BadRequest { code, .. } | StorageError::Internal { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Classify a transport failure for operation `code` on `key`.
    pub(crate) fn from_transport(code: ErrorCode, key: &str, err: TransportError) -> Self {
        match err {
            TransportError::NoSuchKey(_) => StorageError::NotFound(key.to_string()),
            other => StorageError::Internal {
                code,
                message: format!("{} failed for key {}", code, key),
                source: Some(other),
            },
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::BadRequest { code, message } => AppError::Rejected { code, message },
            StorageError::Internal {
                code,
                message,
                source,
            } => AppError::Storage {
                code,
                message: match source {
                    Some(source) => format!("{}: {}", message, source),
                    None => message,
                },
            },
            StorageError::ConfigError(msg) => {
                AppError::Internal(format!("Storage configuration error: {}", msg))
            }
        }
    }
}
