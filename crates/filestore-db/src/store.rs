use chrono::{DateTime, Utc};
use filestore_core::{AppError, NodeType, ResourceMetadata, ScanStatus, UploadStatus};

/// Durable metadata records, keyed by resource id.
///
/// Implementations are expected to be usable from many tasks at once; each call is
/// independent and no call spans a transaction with another.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. A duplicate resource id is reported as [`AppError::Conflict`],
    /// including when two inserts race for the same id.
    async fn insert(&self, record: &ResourceMetadata) -> Result<(), AppError>;

    async fn exists_by_id(&self, resource_id: &str) -> Result<bool, AppError>;

    /// Persist every mutable field of `record`, stamping `updated_on`. Missing rows are NotFound.
    async fn save(&self, record: &ResourceMetadata) -> Result<ResourceMetadata, AppError>;

    /// Remove a record. Returns whether a row was deleted.
    async fn delete(&self, resource_id: &str) -> Result<bool, AppError>;

    /// Set the scan verdict. Returns whether a row was updated.
    async fn update_scan_status(
        &self,
        resource_id: &str,
        status: ScanStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Set the stored size only, leaving statuses as they are. `None` if the row is gone.
    async fn update_size(
        &self,
        resource_id: &str,
        size_in_bytes: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError>;

    /// Set the name when one is given; `updated_on` is stamped either way. `None` if the
    /// row is gone.
    async fn update_name(
        &self,
        resource_id: &str,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError>;

    /// Set the upload status. Returns whether a row was updated.
    async fn update_upload_status(
        &self,
        resource_id: &str,
        status: UploadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn find_by_id(
        &self,
        resource_id: &str,
        node_type: NodeType,
    ) -> Result<Option<ResourceMetadata>, AppError>;

    /// Records for the given ids that exist; missing ids are simply absent from the result.
    async fn find_by_ids(
        &self,
        resource_ids: &[String],
        node_type: NodeType,
    ) -> Result<Vec<ResourceMetadata>, AppError>;

    /// PENDING records last touched before `before`, oldest first.
    async fn find_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ResourceMetadata>, AppError>;
}
