//! Filestore Core Library
//!
//! This crate provides the domain models, error types, configuration, and small
//! shared utilities (content-type sniffing, object path building, retry executor)
//! used by every other filestore component.

pub mod config;
pub mod constants;
pub mod content_type;
pub mod error;
pub mod file_uri;
pub mod models;
pub mod retry;

// Re-export commonly used types
pub use config::{FileStoreConfig, StoreSettings, StoreSettingsOverrides};
pub use constants::ErrorCode;
pub use content_type::detect_content_type;
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel};
pub use file_uri::{resource_object_path, FileUri};
pub use models::{
    FileStat, NewResource, NodeType, ResourceMetadata, ResourcePatch, ScanStatus, UploadStatus,
};
pub use retry::{retry_with_policy, RetryPolicy};
