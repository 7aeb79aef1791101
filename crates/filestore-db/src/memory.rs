//! In-process metadata store for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use filestore_core::{AppError, NodeType, ResourceMetadata, ScanStatus, UploadStatus};
use tokio::sync::RwLock;

use crate::store::MetadataStore;

#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, ResourceMetadata>>,
    fail_upload_status: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `update_upload_status` call fail until reset.
    pub fn fail_upload_status_updates(&self, fail: bool) {
        self.fail_upload_status.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, resource_id: &str) -> Option<ResourceMetadata> {
        self.records.read().await.get(resource_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, record: &ResourceMetadata) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.resource_id) {
            return Err(AppError::Conflict(format!(
                "Resource id {} already exists",
                record.resource_id
            )));
        }
        records.insert(record.resource_id.clone(), record.clone());
        Ok(())
    }

    async fn exists_by_id(&self, resource_id: &str) -> Result<bool, AppError> {
        Ok(self.records.read().await.contains_key(resource_id))
    }

    async fn save(&self, record: &ResourceMetadata) -> Result<ResourceMetadata, AppError> {
        let mut records = self.records.write().await;
        let existing = records.get_mut(&record.resource_id).ok_or_else(|| {
            AppError::NotFound(format!("Resource metadata {} not found", record.resource_id))
        })?;

        let mut updated = record.clone();
        updated.node_type = existing.node_type;
        updated.created_on = existing.created_on;
        updated.updated_on = Utc::now();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, resource_id: &str) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(resource_id).is_some())
    }

    async fn update_scan_status(
        &self,
        resource_id: &str,
        status: ScanStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        Ok(match records.get_mut(resource_id) {
            Some(record) => {
                record.scan_status = status;
                record.updated_on = at;
                true
            }
            None => false,
        })
    }

    async fn update_size(
        &self,
        resource_id: &str,
        size_in_bytes: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(resource_id).map(|record| {
            record.size_in_bytes = size_in_bytes;
            record.updated_on = at;
            record.clone()
        }))
    }

    async fn update_name(
        &self,
        resource_id: &str,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(resource_id).map(|record| {
            if let Some(name) = name {
                record.name = name.to_string();
            }
            record.updated_on = at;
            record.clone()
        }))
    }

    async fn update_upload_status(
        &self,
        resource_id: &str,
        status: UploadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        if self.fail_upload_status.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "Metadata store unavailable".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        Ok(match records.get_mut(resource_id) {
            Some(record) => {
                record.upload_status = status;
                record.updated_on = at;
                true
            }
            None => false,
        })
    }

    async fn find_by_id(
        &self,
        resource_id: &str,
        node_type: NodeType,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .get(resource_id)
            .filter(|r| r.node_type == node_type)
            .cloned())
    }

    async fn find_by_ids(
        &self,
        resource_ids: &[String],
        node_type: NodeType,
    ) -> Result<Vec<ResourceMetadata>, AppError> {
        let records = self.records.read().await;
        Ok(resource_ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|r| r.node_type == node_type)
            .cloned()
            .collect())
    }

    async fn find_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ResourceMetadata>, AppError> {
        let records = self.records.read().await;
        let mut pending: Vec<ResourceMetadata> = records
            .values()
            .filter(|r| r.upload_status == UploadStatus::Pending && r.updated_on < before)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.updated_on);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }
}
