//! Object store client
//!
//! Wraps an [`ObjectTransport`] with the error taxonomy and retry rules every
//! caller relies on:
//!
//! - a "no such key" answer becomes [`StorageError::NotFound`];
//! - any other failure becomes [`StorageError::Internal`] tagged with the
//!   operation's [`ErrorCode`];
//! - `put` and `stat` retry raw I/O failures with a fixed backoff, bounded by the
//!   configured max attempts. Every other operation is single-shot.
//!
//! Object paths are relative to the bucket; a leading `/` is stripped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use filestore_core::constants::{AV_STATUS, AV_TIMESTAMP, PATH_DELIMITER};
use filestore_core::{detect_content_type, retry_with_policy, ErrorCode, RetryPolicy, StoreSettings};
use futures::StreamExt;

use crate::error::{StorageError, StorageResult, TransportError};
use crate::traits::ObjectTransport;
use crate::types::{ByteStream, DeleteFailure, DownloadFile, ObjectStat, PutOptions, PutReceipt};

#[derive(Clone)]
pub struct ObjectStoreClient {
    transport: Arc<dyn ObjectTransport>,
    settings: StoreSettings,
    transport_retry: RetryPolicy,
}

fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl ObjectStoreClient {
    pub fn new(transport: Arc<dyn ObjectTransport>, settings: StoreSettings) -> Self {
        let transport_retry =
            RetryPolicy::fixed(settings.retry_max_attempts, settings.retry_backoff());
        Self {
            transport,
            settings,
            transport_retry,
        }
    }

    /// Default bucket of this client.
    pub fn bucket_name(&self) -> &str {
        &self.settings.bucket_name
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Write `body` at `path`.
    ///
    /// When `package_name` is given the object is stored as an attachment with that
    /// file name. Retries raw I/O failures; anything left over is reported as
    /// [`ErrorCode::Save`].
    pub async fn put(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        package_name: Option<&str>,
    ) -> StorageResult<PutReceipt> {
        let key = relative(path);
        let size = body.len() as u64;
        let options = PutOptions {
            content_type: Some(detect_content_type(package_name.unwrap_or(key))),
            content_disposition: package_name
                .map(|name| format!("attachment; fileName=\"{}\"", name.replace('"', ""))),
            metadata: HashMap::new(),
        };

        let etag = retry_with_policy(
            self.transport_retry,
            "object store put",
            || self.transport.put_object(bucket, key, body.clone(), &options),
            TransportError::is_io,
        )
        .await
        .map_err(|e| StorageError::from_transport(ErrorCode::Save, key, e))?;

        Ok(PutReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag,
            size,
        })
    }

    /// Open a stream over the object's bytes.
    pub async fn get(&self, bucket: &str, path: &str) -> StorageResult<ByteStream> {
        let key = relative(path).to_string();
        let stream = self
            .transport
            .get_object(bucket, &key)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::Get, &key, e))?;

        Ok(Box::pin(stream.map(move |chunk| {
            chunk.map_err(|e| StorageError::from_transport(ErrorCode::Get, &key, e))
        })))
    }

    /// Stat then open, so callers get size and content type without a second round-trip.
    pub async fn get_with_stat(&self, bucket: &str, path: &str) -> StorageResult<DownloadFile> {
        let stat = self.stat(bucket, path).await?;
        let stream = self.get(bucket, path).await?;
        Ok(DownloadFile { stream, stat })
    }

    pub async fn stat(&self, bucket: &str, path: &str) -> StorageResult<ObjectStat> {
        let key = relative(path);
        retry_with_policy(
            self.transport_retry,
            "object store stat",
            || self.transport.head_object(bucket, key),
            TransportError::is_io,
        )
        .await
        .map_err(|e| StorageError::from_transport(ErrorCode::GetMetadata, key, e))
    }

    pub async fn remove(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let start = Instant::now();
        let key = relative(path);
        self.transport
            .delete_object(bucket, key)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::Remove, key, e))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object removed"
        );
        Ok(())
    }

    /// Remove many objects. Keys that could not be removed are logged and returned.
    pub async fn remove_many(
        &self,
        bucket: &str,
        paths: &[String],
    ) -> StorageResult<Vec<DeleteFailure>> {
        let keys: Vec<String> = paths.iter().map(|p| relative(p).to_string()).collect();
        let failures = self
            .transport
            .delete_objects(bucket, &keys)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::Remove, bucket, e))?;

        for failure in &failures {
            tracing::error!(
                bucket = %bucket,
                key = %failure.key,
                error = %failure.message,
                "Error while removing object"
            );
        }
        Ok(failures)
    }

    pub async fn copy(
        &self,
        src_bucket: &str,
        src_path: &str,
        dst_bucket: &str,
        dst_path: &str,
    ) -> StorageResult<()> {
        let start = Instant::now();
        let (src, dst) = (relative(src_path), relative(dst_path));
        self.transport
            .copy_object(src_bucket, src, dst_bucket, dst)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::Copy, src, e))?;

        tracing::info!(
            from_key = %src,
            to_key = %dst,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object copied"
        );
        Ok(())
    }

    /// Copy then remove the source.
    pub async fn move_object(
        &self,
        src_bucket: &str,
        src_path: &str,
        dst_bucket: &str,
        dst_path: &str,
    ) -> StorageResult<()> {
        self.copy(src_bucket, src_path, dst_bucket, dst_path).await?;
        self.remove(src_bucket, src_path).await
    }

    /// Object keys under `prefix`. An empty result is a valid answer.
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> StorageResult<Vec<String>> {
        let prefix = relative(prefix);
        let entries = self
            .transport
            .list_objects(bucket, prefix, recursive)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::GetFilesName, prefix, e))?;
        Ok(entries.into_iter().map(|e| e.key).collect())
    }

    /// Every object name in a bucket.
    pub async fn list_bucket(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let entries = self
            .transport
            .list_objects(bucket, "", true)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::GetFilesName, bucket, e))?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.key)
            .collect())
    }

    /// Names of the files directly inside `folder`, skipping directory markers,
    /// empty objects, and the folder itself.
    pub async fn list_folder(&self, bucket: &str, folder: &str) -> StorageResult<Vec<String>> {
        let folder = relative(folder);
        let prefix = if folder.is_empty() || folder.ends_with(PATH_DELIMITER) {
            folder.to_string()
        } else {
            format!("{}{}", folder, PATH_DELIMITER)
        };

        let entries = self
            .transport
            .list_objects(bucket, &prefix, false)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::GetFilesName, &prefix, e))?;

        Ok(entries
            .into_iter()
            .filter(|e| !e.is_dir && e.size > 0 && e.key != prefix)
            .map(|e| e.key)
            .collect())
    }

    /// Listing used by the scanner: no match means the object to scan does not exist.
    pub async fn scan_list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = relative(prefix);
        let entries = self
            .transport
            .list_objects(bucket, prefix, true)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::Get, prefix, e))?;

        let keys: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.key)
            .collect();
        if keys.is_empty() {
            return Err(StorageError::NotFound(format!(
                "{}: {}",
                ErrorCode::ScanFileNotFound,
                prefix
            )));
        }
        Ok(keys)
    }

    /// Presigned GET URL. Expiry is enforced by the store, not tracked here.
    pub async fn presign(
        &self,
        bucket: &str,
        path: &str,
        expiry: Duration,
        params: &HashMap<String, String>,
    ) -> StorageResult<String> {
        let key = relative(path);
        self.transport
            .presign_get(bucket, key, expiry, params)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::GetPresigned, key, e))
    }

    pub async fn get_tags(&self, bucket: &str, path: &str) -> StorageResult<HashMap<String, String>> {
        let key = relative(path);
        self.transport
            .get_tags(bucket, key)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::GetTags, key, e))
    }

    pub async fn set_tags(
        &self,
        bucket: &str,
        path: &str,
        tags: &HashMap<String, String>,
    ) -> StorageResult<()> {
        let key = relative(path);
        self.transport
            .put_tags(bucket, key, tags)
            .await
            .map_err(|e| StorageError::from_transport(ErrorCode::SaveTags, key, e))
    }

    /// Record an antivirus verdict on an object, keeping its other tags.
    pub async fn set_antivirus_tags(
        &self,
        bucket: &str,
        path: &str,
        status: &str,
    ) -> StorageResult<()> {
        let mut tags = self.get_tags(bucket, path).await?;
        tags.insert(AV_STATUS.to_string(), status.to_string());
        tags.insert(AV_TIMESTAMP.to_string(), Utc::now().timestamp_millis().to_string());
        self.set_tags(bucket, path, &tags).await?;

        tracing::info!(bucket = %bucket, key = %relative(path), status = %status, "Antivirus tags written");
        Ok(())
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;
    use crate::memory::{MemoryTransport, TransportOp};
    use crate::types::collect_bytes;

    const BUCKET: &str = "files";

    fn client_with(transport: Arc<MemoryTransport>, attempts: u32) -> ObjectStoreClient {
        let mut settings = StoreSettings::for_bucket(BUCKET);
        settings.retry_max_attempts = attempts;
        settings.retry_fixed_backoff_ms = 0;
        ObjectStoreClient::new(transport, settings)
    }

    #[tokio::test]
    async fn test_put_retries_io_failures() {
        let transport = Arc::new(MemoryTransport::new());
        transport
            .fail_next(TransportOp::Put, TransportError::Io("reset".into()), 2)
            .await;
        let client = client_with(transport.clone(), 3);

        let receipt = client
            .put(BUCKET, "/images/a", Bytes::from_static(b"abc"), None)
            .await
            .unwrap();
        assert_eq!(receipt.key, "images/a");
        assert_eq!(receipt.size, 3);
        assert_eq!(transport.calls(TransportOp::Put).await, 3);
    }

    #[tokio::test]
    async fn test_put_gives_up_with_save_code() {
        let transport = Arc::new(MemoryTransport::new());
        transport
            .fail_next(TransportOp::Put, TransportError::Io("reset".into()), 5)
            .await;
        let client = client_with(transport.clone(), 2);

        let err = client
            .put(BUCKET, "images/a", Bytes::from_static(b"abc"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Save));
        assert_eq!(transport.calls(TransportOp::Put).await, 2);
    }

    #[tokio::test]
    async fn test_put_does_not_retry_service_errors() {
        let transport = Arc::new(MemoryTransport::new());
        transport
            .fail_next(TransportOp::Put, TransportError::Service("denied".into()), 1)
            .await;
        let client = client_with(transport.clone(), 3);

        assert!(client
            .put(BUCKET, "images/a", Bytes::from_static(b"abc"), None)
            .await
            .is_err());
        assert_eq!(transport.calls(TransportOp::Put).await, 1);
    }

    #[tokio::test]
    async fn test_put_with_package_name_sets_disposition() {
        let transport = Arc::new(MemoryTransport::new());
        let client = client_with(transport.clone(), 1);

        client
            .put(BUCKET, "exports/1", Bytes::from_static(b"PK"), Some("bundle.zip"))
            .await
            .unwrap();
        let stat = client.stat(BUCKET, "exports/1").await.unwrap();
        assert_eq!(
            stat.headers.get("content-disposition").map(String::as_str),
            Some("attachment; fileName=\"bundle.zip\"")
        );
        assert_eq!(stat.content_type.as_deref(), Some("application/zip"));
    }

    #[tokio::test]
    async fn test_stat_retries_then_maps_missing_to_not_found() {
        let transport = Arc::new(MemoryTransport::new());
        transport
            .fail_next(TransportOp::Head, TransportError::Io("timeout".into()), 1)
            .await;
        let client = client_with(transport.clone(), 3);

        let err = client.stat(BUCKET, "images/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(transport.calls(TransportOp::Head).await, 2);
    }

    #[tokio::test]
    async fn test_get_is_single_shot() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "images/a", "data").await;
        transport
            .fail_next(TransportOp::Get, TransportError::Io("reset".into()), 1)
            .await;
        let client = client_with(transport.clone(), 3);

        let err = client.get(BUCKET, "images/a").await.err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::Get));
        assert_eq!(transport.calls(TransportOp::Get).await, 1);

        let bytes = collect_bytes(client.get(BUCKET, "images/a").await.unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"data"));
    }

    #[tokio::test]
    async fn test_move_copies_then_removes() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a/one", "1").await;
        let client = client_with(transport.clone(), 1);

        client.move_object(BUCKET, "a/one", "archive", "b/one").await.unwrap();
        assert!(transport.object_bytes(BUCKET, "a/one").await.is_none());
        assert_eq!(
            transport.object_bytes("archive", "b/one").await,
            Some(Bytes::from_static(b"1"))
        );
    }

    #[tokio::test]
    async fn test_copy_of_missing_object_is_not_found() {
        let transport = Arc::new(MemoryTransport::new());
        let client = client_with(transport, 1);
        let err = client.copy(BUCKET, "nope", BUCKET, "dst").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_folder_filters_entries() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "docs/", "").await;
        transport.insert_object(BUCKET, "docs/a.txt", "a").await;
        transport.insert_object(BUCKET, "docs/empty.txt", "").await;
        transport.insert_object(BUCKET, "docs/sub/b.txt", "b").await;
        let client = client_with(transport, 1);

        let names = client.list_folder(BUCKET, "docs").await.unwrap();
        assert_eq!(names, vec!["docs/a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_list_empty_is_not_found_but_list_is_ok() {
        let transport = Arc::new(MemoryTransport::new());
        let client = client_with(transport, 1);

        assert!(client.list(BUCKET, "queue/", true).await.unwrap().is_empty());
        let err = client.scan_list(BUCKET, "queue/").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(ref msg) if msg.contains("scan.file.not.found")));
    }

    #[tokio::test]
    async fn test_set_antivirus_tags_keeps_existing_tags() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "images/a", "a").await;
        transport.set_tag(BUCKET, "images/a", "owner", "ops").await;
        let client = client_with(transport.clone(), 1);

        client
            .set_antivirus_tags(BUCKET, "images/a", "clean")
            .await
            .unwrap();
        let tags = transport.object_tags(BUCKET, "images/a").await.unwrap();
        assert_eq!(tags.get(AV_STATUS).map(String::as_str), Some("clean"));
        assert!(tags.contains_key(AV_TIMESTAMP));
        assert_eq!(tags.get("owner").map(String::as_str), Some("ops"));
    }

    #[tokio::test]
    async fn test_remove_many_reports_no_failures() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "1").await;
        transport.insert_object(BUCKET, "b", "2").await;
        let client = client_with(transport.clone(), 1);

        let failures = client
            .remove_many(BUCKET, &["/a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(failures.is_empty());
        assert_eq!(transport.object_count().await, 0);
    }
}
