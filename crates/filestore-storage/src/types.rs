use std::collections::HashMap;
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use filestore_core::ResourceMetadata;
use futures::{Stream, StreamExt};

use crate::error::{StorageError, TransportError};

/// Byte stream handed to callers of the client.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Byte stream produced by a backend.
pub type TransportStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Snapshot of an object's metadata as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub key: String,
    pub etag: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Stored headers, keys lowercased. User metadata appears as `x-amz-meta-*`.
    pub headers: HashMap<String, String>,
}

/// One listing result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    /// Common prefix (pseudo-directory) rather than an object.
    pub is_dir: bool,
}

/// A key a bulk delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub message: String,
}

/// Options for a single put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    /// User metadata, without the `x-amz-meta-` prefix.
    pub metadata: HashMap<String, String>,
}

/// Result of a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    /// Bytes sent.
    pub size: u64,
}

/// A byte stream paired with the stat taken when it was opened.
pub struct DownloadFile {
    pub stream: ByteStream,
    pub stat: ObjectStat,
}

/// A resource's metadata paired with its open content stream.
///
/// The stream belongs to whoever holds this value; dropping it releases the
/// underlying connection.
pub struct FileAndMetadata {
    pub metadata: ResourceMetadata,
    pub stream: ByteStream,
}

impl FileAndMetadata {
    pub fn new(metadata: ResourceMetadata, stream: ByteStream) -> Self {
        Self { metadata, stream }
    }

    pub fn into_parts(self) -> (ResourceMetadata, ByteStream) {
        (self.metadata, self.stream)
    }
}

/// Stream over bytes already in memory.
pub fn bytes_stream(bytes: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(bytes) }))
}

/// Drain a stream into one contiguous buffer.
pub async fn collect_bytes(mut stream: ByteStream) -> Result<Bytes, StorageError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buffer))
}
