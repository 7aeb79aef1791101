//! Upload coordination between the metadata store and the object store.
//!
//! An upload reserves a PENDING metadata row, writes the blob, then corrects the
//! recorded size from the stored object and flips the row to COMPLETED. There is no
//! cross-store transaction: a failed write is compensated by deleting the
//! reservation, and a row left PENDING after a successful write is repaired by
//! [`UploadCoordinator::reconcile`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use filestore_core::{
    detect_content_type, resource_object_path, retry_with_policy, AppError, ErrorCode,
    NewResource, NodeType, ResourceMetadata, RetryPolicy, UploadStatus,
};
use filestore_db::MetadataStore;
use filestore_storage::{collect_bytes, ByteStream, ObjectStoreClient, StorageError};

/// Only short transfers are worth another full upload attempt. Raw I/O failures are
/// already retried underneath by the client.
fn is_short_transfer(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::Internal {
            code: ErrorCode::Save,
            ..
        }
    )
}

/// Outcome of a sweep over stale PENDING rows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: usize,
    /// Rows whose blob was never written.
    pub missing: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    metadata: Arc<dyn MetadataStore>,
    client: ObjectStoreClient,
    retry: RetryPolicy,
}

impl UploadCoordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>, client: ObjectStoreClient) -> Self {
        let retry = RetryPolicy::no_backoff(client.settings().upload_retry_max_attempts);
        Self {
            metadata,
            client,
            retry,
        }
    }

    fn object_path(&self, resource_id: &str) -> String {
        resource_object_path(&self.client.settings().root_directory, resource_id)
    }

    /// Store `body` as a new resource and return its id.
    ///
    /// A caller-supplied id that already exists fails with Conflict before any blob I/O.
    #[tracing::instrument(skip(self, request, body), fields(name = %request.name))]
    pub async fn upload(&self, request: NewResource, body: ByteStream) -> Result<String, AppError> {
        let start = Instant::now();

        if let Some(id) = request.requested_id() {
            if self.metadata.exists_by_id(id).await? {
                return Err(AppError::Conflict(format!("Resource id {} already exists", id)));
            }
        }

        let content_type = detect_content_type(&request.name);
        let record = ResourceMetadata::reserve(request, content_type);
        self.metadata.insert(&record).await?;

        tracing::debug!(
            resource_id = %record.resource_id,
            content_type = %record.content_type,
            "Upload reserved"
        );

        if let Err(e) = self.write_blob(&record, body).await {
            return Err(self.abandon(&record, e).await);
        }

        match self.correct_size(&record).await {
            Ok(saved) => {
                self.mark_completed(&saved.resource_id).await;
                tracing::info!(
                    resource_id = %saved.resource_id,
                    size_bytes = saved.size_in_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    resource_id = %record.resource_id,
                    error = %e,
                    "Blob written but size correction failed; resource left PENDING"
                );
            }
        }

        Ok(record.resource_id)
    }

    async fn write_blob(&self, record: &ResourceMetadata, body: ByteStream) -> Result<(), StorageError> {
        let bytes = collect_bytes(body).await?;
        let bucket = self.client.bucket_name().to_string();
        let path = self.object_path(&record.resource_id);

        retry_with_policy(
            self.retry,
            "resource upload",
            || self.client.put(&bucket, &path, bytes.clone(), None),
            is_short_transfer,
        )
        .await?;
        Ok(())
    }

    /// Drop the reservation after a failed write and classify the failure for the caller.
    async fn abandon(&self, record: &ResourceMetadata, err: StorageError) -> AppError {
        match self.metadata.delete(&record.resource_id).await {
            Ok(_) => tracing::debug!(resource_id = %record.resource_id, "Reservation removed"),
            Err(e) => tracing::error!(
                resource_id = %record.resource_id,
                error = %e,
                "Failed to remove reservation after upload failure"
            ),
        }

        let err = AppError::from(err);
        if err.is_pass_through() {
            return err;
        }

        tracing::error!(
            resource_id = %record.resource_id,
            error = %err,
            "Upload failed"
        );
        AppError::InternalWithSource {
            message: format!(
                "Error while uploading file (sourceId: {}, resourceId: {}, name: {})",
                record.source_id.as_deref().unwrap_or("-"),
                record.resource_id,
                record.name
            ),
            source: anyhow::Error::new(err),
        }
    }

    /// Replace the recorded size with the stored object's size. Only the size column is
    /// written, so a verdict recorded meanwhile by the scanner survives.
    async fn correct_size(&self, record: &ResourceMetadata) -> Result<ResourceMetadata, AppError> {
        let stat = self
            .client
            .stat(self.client.bucket_name(), &self.object_path(&record.resource_id))
            .await?;

        let stored = i64::try_from(stat.size).unwrap_or(i64::MAX);
        if stored != record.size_in_bytes {
            tracing::debug!(
                resource_id = %record.resource_id,
                declared = record.size_in_bytes,
                stored,
                "Declared size differs from stored size"
            );
        }
        self.metadata
            .update_size(&record.resource_id, stored, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Resource {} not found", record.resource_id))
            })
    }

    async fn mark_completed(&self, resource_id: &str) {
        if let Err(e) = self
            .metadata
            .update_upload_status(resource_id, UploadStatus::Completed, Utc::now())
            .await
        {
            tracing::error!(
                resource_id = %resource_id,
                error = %e,
                "Failed to mark upload completed"
            );
        }
    }

    /// Re-derive size and status for a resource from its stored blob.
    ///
    /// COMPLETED resources are returned as they are. NotFound if the resource or its
    /// blob does not exist.
    pub async fn reconcile(&self, resource_id: &str) -> Result<ResourceMetadata, AppError> {
        let record = self
            .metadata
            .find_by_id(resource_id, NodeType::File)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource_id)))?;

        if record.upload_status == UploadStatus::Completed {
            return Ok(record);
        }

        let mut saved = self.correct_size(&record).await?;
        let now = Utc::now();
        self.metadata
            .update_upload_status(resource_id, UploadStatus::Completed, now)
            .await?;
        saved.upload_status = UploadStatus::Completed;
        saved.updated_on = now;

        tracing::info!(
            resource_id = %resource_id,
            size_bytes = saved.size_in_bytes,
            "Resource reconciled"
        );
        Ok(saved)
    }

    /// Reconcile PENDING rows untouched for at least `older_than`.
    pub async fn reconcile_pending(
        &self,
        older_than: Duration,
        limit: i64,
    ) -> Result<ReconcileReport, AppError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| AppError::BadRequest(format!("Invalid age: {}", e)))?;
        let pending = self.metadata.find_pending(cutoff, limit).await?;

        let mut report = ReconcileReport::default();
        for record in pending {
            match self.reconcile(&record.resource_id).await {
                Ok(_) => report.completed += 1,
                Err(AppError::NotFound(_)) => {
                    tracing::warn!(resource_id = %record.resource_id, "PENDING resource has no blob");
                    report.missing += 1;
                }
                Err(e) => {
                    tracing::error!(resource_id = %record.resource_id, error = %e, "Reconciliation failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
