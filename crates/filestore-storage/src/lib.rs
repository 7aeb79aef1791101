//! Filestore Storage Library
//!
//! This crate provides the object store side of filestore: the [`ObjectTransport`]
//! trait with S3 and in-process implementations, the [`ObjectStoreClient`] that
//! classifies and retries transport failures, and the [`ScanGate`] that refuses to
//! hand out content whose antivirus verdict is missing or "infected".
//!
//! # Object paths
//!
//! Paths are bucket-relative. Resource blobs live at `{root_directory}/{resource_id}`;
//! see [`filestore_core::resource_object_path`]. A leading `/` is ignored.

pub mod client;
pub mod error;
pub mod factory;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod scan;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use client::ObjectStoreClient;
pub use error::{StorageError, StorageResult, TransportError};
#[cfg(feature = "storage-memory")]
pub use factory::memory_client;
pub use factory::{create_client, create_named_client};
#[cfg(feature = "storage-memory")]
pub use memory::{MemoryTransport, TransportOp};
#[cfg(feature = "storage-s3")]
pub use s3::S3Transport;
pub use scan::ScanGate;
pub use traits::{ObjectTransport, TransportResult};
pub use types::{
    bytes_stream, collect_bytes, ByteStream, DeleteFailure, DownloadFile, FileAndMetadata,
    ObjectEntry, ObjectStat, PutOptions, PutReceipt,
};
