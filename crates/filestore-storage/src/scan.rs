//! Antivirus gate in front of every content-returning read.
//!
//! The verdict is written by an external scanner as an object tag. Objects stored
//! before tagging was introduced carry it as a stored header instead, so both
//! sources are consulted.

use std::collections::HashMap;

use filestore_core::constants::{AV_STATUS, AV_STATUS_INFECTED};
use filestore_core::ErrorCode;

use crate::client::ObjectStoreClient;
use crate::error::{StorageError, StorageResult};
use crate::types::DownloadFile;

#[derive(Clone)]
pub struct ScanGate {
    client: ObjectStoreClient,
}

fn status_in(values: &HashMap<String, String>) -> Option<&str> {
    values
        .get(AV_STATUS)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

impl ScanGate {
    pub fn new(client: ObjectStoreClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ObjectStoreClient {
        &self.client
    }

    /// Fail with BadRequest unless the object carries a verdict that is not "infected".
    pub async fn ensure_readable(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let tags = self.client.get_tags(bucket, path).await?;
        let stat = self.client.stat(bucket, path).await?;

        let from_tags = status_in(&tags);
        let from_headers = status_in(&stat.headers);

        if from_tags.is_none() && from_headers.is_none() {
            tracing::warn!(bucket = %bucket, key = %path, "Antivirus status absent");
            return Err(StorageError::BadRequest {
                code: ErrorCode::StatusAbsent,
                message: format!("Antivirus status absent for {}", path),
            });
        }

        let infected = [from_tags, from_headers]
            .into_iter()
            .flatten()
            .any(|status| status.eq_ignore_ascii_case(AV_STATUS_INFECTED));
        if infected {
            tracing::warn!(bucket = %bucket, key = %path, "Read of infected object refused");
            return Err(StorageError::BadRequest {
                code: ErrorCode::StatusInfected,
                message: format!("Antivirus status infected for {}", path),
            });
        }

        Ok(())
    }

    /// Gate then open the object.
    pub async fn fetch(&self, bucket: &str, path: &str) -> StorageResult<DownloadFile> {
        self.ensure_readable(bucket, path).await?;
        self.client.get_with_stat(bucket, path).await
    }

    /// Open the object without consulting its verdict.
    ///
    /// Reserved for trusted internal callers, chiefly the scanner itself, which must
    /// read objects before any verdict exists.
    pub async fn fetch_for_scan(&self, bucket: &str, path: &str) -> StorageResult<DownloadFile> {
        tracing::debug!(bucket = %bucket, key = %path, "Scan gate bypassed");
        self.client.get_with_stat(bucket, path).await
    }

    /// Object names under `prefix` waiting for the scanner. NotFound when there are none.
    pub async fn scan_list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        self.client.scan_list(bucket, prefix).await
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use filestore_core::StoreSettings;
    use std::sync::Arc;

    const BUCKET: &str = "files";

    async fn gate_with(transport: Arc<MemoryTransport>) -> ScanGate {
        let settings = StoreSettings::for_bucket(BUCKET);
        ScanGate::new(ObjectStoreClient::new(transport, settings))
    }

    #[tokio::test]
    async fn test_clean_tag_is_readable() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "x").await;
        transport.set_tag(BUCKET, "a", AV_STATUS, "clean").await;
        let gate = gate_with(transport).await;

        assert!(gate.ensure_readable(BUCKET, "a").await.is_ok());
        assert_eq!(gate.fetch(BUCKET, "a").await.unwrap().stat.size, 1);
    }

    #[tokio::test]
    async fn test_missing_status_is_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "x").await;
        let gate = gate_with(transport).await;

        let err = gate.ensure_readable(BUCKET, "a").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::StatusAbsent));
    }

    #[tokio::test]
    async fn test_legacy_header_counts_as_status() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "x").await;
        transport.set_header(BUCKET, "a", AV_STATUS, "clean").await;
        let gate = gate_with(transport).await;

        assert!(gate.ensure_readable(BUCKET, "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_infected_in_either_source_is_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "x").await;
        transport.set_tag(BUCKET, "a", AV_STATUS, "clean").await;
        transport.set_header(BUCKET, "a", AV_STATUS, "INFECTED").await;
        let gate = gate_with(transport).await;

        let err = gate.ensure_readable(BUCKET, "a").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::StatusInfected));
    }

    #[tokio::test]
    async fn test_fetch_for_scan_ignores_verdict() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "a", "x").await;
        transport.set_tag(BUCKET, "a", AV_STATUS, "infected").await;
        let gate = gate_with(transport).await;

        assert!(gate.fetch(BUCKET, "a").await.is_err());
        assert!(gate.fetch_for_scan(BUCKET, "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_scan_list_ignores_verdict() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert_object(BUCKET, "queue/a", "x").await;
        transport.set_tag(BUCKET, "queue/a", AV_STATUS, "infected").await;
        let gate = gate_with(transport).await;

        assert_eq!(
            gate.scan_list(BUCKET, "queue/").await.unwrap(),
            vec!["queue/a".to_string()]
        );
        assert!(gate.scan_list(BUCKET, "empty/").await.is_err());
    }
}
