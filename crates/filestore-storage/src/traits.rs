//! Object store transport trait
//!
//! Everything below the client: authentication, request signing, connection pooling,
//! and the wire protocol belong to an [`ObjectTransport`] implementation. Backends
//! report raw [`TransportError`]s; classification and retries happen in the client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::types::{DeleteFailure, ObjectEntry, ObjectStat, PutOptions, TransportStream};

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Write `body` at `key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> TransportResult<Option<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> TransportResult<TransportStream>;

    async fn head_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectStat>;

    async fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()>;

    /// Delete many keys in one call, returning the keys that could not be removed.
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> TransportResult<Vec<DeleteFailure>>;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> TransportResult<()>;

    /// List entries under `prefix`. Non-recursive listings report sub-prefixes as directories.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> TransportResult<Vec<ObjectEntry>>;

    /// Presigned GET URL. `params` are response overrides such as `response-content-disposition`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        params: &HashMap<String, String>,
    ) -> TransportResult<String>;

    async fn get_tags(&self, bucket: &str, key: &str) -> TransportResult<HashMap<String, String>>;

    /// Replace the tag set of an object.
    async fn put_tags(
        &self,
        bucket: &str,
        key: &str,
        tags: &HashMap<String, String>,
    ) -> TransportResult<()>;
}
