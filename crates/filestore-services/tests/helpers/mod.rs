//! Test helpers: build a FileService over in-process stores.
//!
//! Run from workspace root: `cargo test -p filestore-services`.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use filestore_core::constants::AV_STATUS;
use filestore_core::{resource_object_path, NewResource, ResourceMetadata, StoreSettings, UploadStatus};
use filestore_db::{InMemoryMetadataStore, MetadataStore};
use filestore_services::FileService;
use filestore_storage::{bytes_stream, collect_bytes, memory_client, ByteStream, MemoryTransport};

pub const BUCKET: &str = "files";

pub struct TestContext {
    pub service: FileService,
    pub transport: Arc<MemoryTransport>,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub settings: StoreSettings,
}

/// Defaults with no transport retry and no backoff, so each put call is one attempt.
pub fn test_settings() -> StoreSettings {
    let mut settings = StoreSettings::for_bucket(BUCKET);
    settings.retry_max_attempts = 1;
    settings.retry_fixed_backoff_ms = 0;
    settings.upload_retry_max_attempts = 3;
    settings
}

pub fn setup() -> TestContext {
    setup_with(test_settings())
}

pub fn setup_with(settings: StoreSettings) -> TestContext {
    let (client, transport) = memory_client(settings.clone());
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let service = FileService::new(metadata.clone(), client);
    TestContext {
        service,
        transport,
        metadata,
        settings,
    }
}

/// Like [`setup`], but the service talks to the store returned by `wrap`, which is
/// handed the in-memory store that `TestContext::metadata` inspects.
pub fn setup_with_store<S, F>(wrap: F) -> TestContext
where
    S: MetadataStore + 'static,
    F: FnOnce(Arc<InMemoryMetadataStore>) -> S,
{
    let settings = test_settings();
    let (client, transport) = memory_client(settings.clone());
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let service = FileService::new(Arc::new(wrap(metadata.clone())), client);
    TestContext {
        service,
        transport,
        metadata,
        settings,
    }
}

pub fn body(data: &'static [u8]) -> ByteStream {
    bytes_stream(Bytes::from_static(data))
}

pub async fn read_all(stream: ByteStream) -> Vec<u8> {
    collect_bytes(stream)
        .await
        .expect("Failed to read stream")
        .to_vec()
}

impl TestContext {
    pub fn object_path(&self, resource_id: &str) -> String {
        resource_object_path(&self.settings.root_directory, resource_id)
    }

    /// Store a completed resource directly, optionally tagged with an antivirus verdict.
    pub async fn seed(
        &self,
        resource_id: &str,
        name: &str,
        data: &'static [u8],
        av_status: Option<&str>,
    ) -> ResourceMetadata {
        let mut record = ResourceMetadata::reserve(
            NewResource::new(name).with_resource_id(resource_id),
            "application/octet-stream",
        );
        record.size_in_bytes = data.len() as i64;
        record.upload_status = UploadStatus::Completed;
        record.updated_on = Utc::now() - Duration::hours(1);
        self.metadata
            .insert(&record)
            .await
            .expect("Failed to seed metadata");

        let path = self.object_path(resource_id);
        self.transport
            .insert_object(BUCKET, &path, Bytes::from_static(data))
            .await;
        if let Some(status) = av_status {
            self.transport.set_tag(BUCKET, &path, AV_STATUS, status).await;
        }
        record
    }
}
