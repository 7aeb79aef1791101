#[cfg(feature = "storage-memory")]
use crate::MemoryTransport;
#[cfg(feature = "storage-s3")]
use crate::S3Transport;
use crate::{ObjectStoreClient, StorageError, StorageResult};
use filestore_core::{FileStoreConfig, StoreSettings};
use std::sync::Arc;

/// Create an S3-backed client from settings
#[cfg(feature = "storage-s3")]
pub async fn create_client(settings: &StoreSettings) -> StorageResult<ObjectStoreClient> {
    settings
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let transport = S3Transport::new(settings).await?;
    tracing::info!(
        bucket = %settings.bucket_name,
        region = %settings.region,
        endpoint = ?settings.endpoint,
        "Object store client created"
    );
    Ok(ObjectStoreClient::new(Arc::new(transport), settings.clone()))
}

#[cfg(not(feature = "storage-s3"))]
pub async fn create_client(_settings: &StoreSettings) -> StorageResult<ObjectStoreClient> {
    Err(StorageError::ConfigError(
        "S3 backend not available (storage-s3 feature not enabled)".to_string(),
    ))
}

/// Create the client registered under `name`, inheriting unset fields from the default store.
pub async fn create_named_client(
    config: &FileStoreConfig,
    name: &str,
) -> StorageResult<ObjectStoreClient> {
    let settings = config
        .client_settings(name)
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;
    tracing::debug!(client = %name, bucket = %settings.bucket_name, "Creating named client");
    create_client(&settings).await
}

/// Client over an in-process store; the transport handle is returned for inspection.
#[cfg(feature = "storage-memory")]
pub fn memory_client(settings: StoreSettings) -> (ObjectStoreClient, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let client = ObjectStoreClient::new(transport.clone(), settings);
    (client, transport)
}
