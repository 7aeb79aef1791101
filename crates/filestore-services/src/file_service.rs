//! Resource operations as seen by a request-handling layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use filestore_core::constants::AV_STATUS_INFECTED;
use filestore_core::{
    resource_object_path, AppError, FileStat, NewResource, NodeType, ResourceMetadata,
    ResourcePatch, ScanStatus,
};
use filestore_db::MetadataStore;
use filestore_storage::{ByteStream, FileAndMetadata, ObjectStoreClient, ScanGate};

use crate::archive::BulkPackager;
use crate::presign::PresignIssuer;
use crate::upload::{ReconcileReport, UploadCoordinator};

#[derive(Clone)]
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    client: ObjectStoreClient,
    gate: ScanGate,
    uploads: UploadCoordinator,
    packager: BulkPackager,
    presigner: PresignIssuer,
}

impl FileService {
    pub fn new(metadata: Arc<dyn MetadataStore>, client: ObjectStoreClient) -> Self {
        let gate = ScanGate::new(client.clone());
        Self {
            uploads: UploadCoordinator::new(metadata.clone(), client.clone()),
            packager: BulkPackager::new(gate.clone()),
            presigner: PresignIssuer::new(gate.clone()),
            metadata,
            client,
            gate,
        }
    }

    pub fn client(&self) -> &ObjectStoreClient {
        &self.client
    }

    fn object_path(&self, resource_id: &str) -> String {
        resource_object_path(&self.client.settings().root_directory, resource_id)
    }

    pub async fn upload(&self, request: NewResource, body: ByteStream) -> Result<String, AppError> {
        self.uploads.upload(request, body).await
    }

    pub async fn get_metadata(&self, resource_id: &str) -> Result<ResourceMetadata, AppError> {
        self.metadata
            .find_by_id(resource_id, NodeType::File)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource_id)))
    }

    /// Records for every id, in request order. Fails NotFound naming all missing ids.
    pub async fn get_metadata_many(
        &self,
        resource_ids: &[String],
    ) -> Result<Vec<ResourceMetadata>, AppError> {
        if resource_ids.is_empty() {
            return Err(AppError::BadRequest(
                "At least one resource id is required".to_string(),
            ));
        }

        let found: HashMap<String, ResourceMetadata> = self
            .metadata
            .find_by_ids(resource_ids, NodeType::File)
            .await?
            .into_iter()
            .map(|r| (r.resource_id.clone(), r))
            .collect();

        let missing: Vec<&str> = resource_ids
            .iter()
            .filter(|id| !found.contains_key(id.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::NotFound(format!(
                "Resources not found: {}",
                missing.join(", ")
            )));
        }

        Ok(resource_ids
            .iter()
            .filter_map(|id| found.get(id).cloned())
            .collect())
    }

    /// Scan-gated download of one resource.
    pub async fn download(&self, resource_id: &str) -> Result<FileAndMetadata, AppError> {
        let metadata = self.get_metadata(resource_id).await?;
        let file = self
            .gate
            .fetch(self.client.bucket_name(), &self.object_path(resource_id))
            .await?;
        Ok(FileAndMetadata::new(metadata, file.stream))
    }

    /// Bundle several resources into one archive named `output_name`.
    pub async fn download_bulk(
        &self,
        resource_ids: &[String],
        output_name: &str,
    ) -> Result<FileAndMetadata, AppError> {
        let entries = self.get_metadata_many(resource_ids).await?;
        self.packager.package(entries, output_name).await
    }

    /// Read a resource for scanning, before any verdict exists.
    pub async fn fetch_for_scan(&self, resource_id: &str) -> Result<FileAndMetadata, AppError> {
        let metadata = self.get_metadata(resource_id).await?;
        let file = self
            .gate
            .fetch_for_scan(self.client.bucket_name(), &self.object_path(resource_id))
            .await?;
        Ok(FileAndMetadata::new(metadata, file.stream))
    }

    /// Remove the blob, then the metadata row.
    pub async fn delete(&self, resource_id: &str) -> Result<(), AppError> {
        self.get_metadata(resource_id).await?;

        let result = async {
            self.client
                .remove(self.client.bucket_name(), &self.object_path(resource_id))
                .await?;
            self.metadata.delete(resource_id).await?;
            Ok::<(), AppError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(resource_id = %resource_id, "Resource deleted");
                Ok(())
            }
            Err(e @ AppError::NotFound(_)) => Err(e),
            Err(e) => {
                tracing::error!(resource_id = %resource_id, error = %e, "Unable to delete file");
                Err(AppError::InternalWithSource {
                    message: format!("Unable to delete file {}", resource_id),
                    source: anyhow::Error::new(e),
                })
            }
        }
    }

    pub async fn stat(&self, resource_id: &str) -> Result<FileStat, AppError> {
        let metadata = self.get_metadata(resource_id).await?;
        let stat = self
            .client
            .stat(self.client.bucket_name(), &self.object_path(resource_id))
            .await?;

        Ok(FileStat {
            etag: stat.etag,
            length: stat.size,
            content_type: stat.content_type,
            scan_status: metadata.scan_status,
        })
    }

    /// Apply a partial update. Only the name can change.
    pub async fn patch(
        &self,
        resource_id: &str,
        patch: ResourcePatch,
    ) -> Result<ResourceMetadata, AppError> {
        self.get_metadata(resource_id).await?;
        self.metadata
            .update_name(resource_id, patch.name.as_deref(), Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource_id)))
    }

    /// Record a scan verdict. Processed verdicts only give way to a rescan request.
    pub async fn update_scan_status(
        &self,
        resource_id: &str,
        status: ScanStatus,
    ) -> Result<(), AppError> {
        let record = self.get_metadata(resource_id).await?;
        if !record.scan_status.allows_transition_to(status) {
            return Err(AppError::Forbidden(format!(
                "Scan status of {} cannot change from {} to {}",
                resource_id, record.scan_status, status
            )));
        }

        if !self
            .metadata
            .update_scan_status(resource_id, status, Utc::now())
            .await?
        {
            return Err(AppError::NotFound(format!("Resource {} not found", resource_id)));
        }

        tracing::info!(
            resource_id = %resource_id,
            from = %record.scan_status,
            to = %status,
            "Scan status updated"
        );
        Ok(())
    }

    /// Write a final verdict to both the object tags and the metadata row.
    pub async fn record_verdict(
        &self,
        resource_id: &str,
        status: ScanStatus,
    ) -> Result<(), AppError> {
        let tag = match status {
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => AV_STATUS_INFECTED,
            other => {
                return Err(AppError::BadRequest(format!(
                    "{} is not a scan verdict",
                    other
                )))
            }
        };

        self.update_scan_status(resource_id, status).await?;
        self.client
            .set_antivirus_tags(
                self.client.bucket_name(),
                &self.object_path(resource_id),
                tag,
            )
            .await?;
        Ok(())
    }

    pub async fn presign(
        &self,
        resource_id: &str,
        expiry: Option<Duration>,
        params: &HashMap<String, String>,
        bypass_scan: bool,
    ) -> Result<String, AppError> {
        self.get_metadata(resource_id).await?;
        self.presigner
            .presign(&self.object_path(resource_id), expiry, params, bypass_scan)
            .await
    }

    pub async fn reconcile(&self, resource_id: &str) -> Result<ResourceMetadata, AppError> {
        self.uploads.reconcile(resource_id).await
    }

    pub async fn reconcile_pending(
        &self,
        older_than: Duration,
        limit: i64,
    ) -> Result<ReconcileReport, AppError> {
        self.uploads.reconcile_pending(older_than, limit).await
    }

    pub async fn list_folder(&self, folder: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .client
            .list_folder(self.client.bucket_name(), folder)
            .await?)
    }

    pub async fn list_bucket(&self) -> Result<Vec<String>, AppError> {
        Ok(self.client.list_bucket(self.client.bucket_name()).await?)
    }
}
