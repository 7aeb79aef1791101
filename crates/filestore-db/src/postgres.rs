use chrono::{DateTime, Utc};
use filestore_core::{AppError, NodeType, ResourceMetadata, ScanStatus, UploadStatus};
use sqlx::{FromRow, PgPool, Postgres};

use crate::store::MetadataStore;

const SELECT_COLUMNS: &str = "resource_id, source_id, name, storage_id, hash, content_type, \
     size_in_bytes, folder_height, file_count, node_type, scan_status, upload_status, \
     created_on, updated_on";

#[derive(Debug, FromRow)]
struct ResourceMetadataRow {
    resource_id: String,
    source_id: Option<String>,
    name: String,
    storage_id: String,
    hash: Option<String>,
    content_type: String,
    size_in_bytes: i64,
    folder_height: i32,
    file_count: i32,
    node_type: NodeType,
    scan_status: ScanStatus,
    upload_status: UploadStatus,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
}

impl From<ResourceMetadataRow> for ResourceMetadata {
    fn from(row: ResourceMetadataRow) -> Self {
        ResourceMetadata {
            resource_id: row.resource_id,
            source_id: row.source_id,
            name: row.name,
            storage_id: row.storage_id,
            hash: row.hash,
            content_type: row.content_type,
            size_in_bytes: row.size_in_bytes,
            folder_height: row.folder_height,
            file_count: row.file_count,
            node_type: row.node_type,
            scan_status: row.scan_status,
            upload_status: row.upload_status,
            created_on: row.created_on,
            updated_on: row.updated_on,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// A lost insert race surfaces as a unique violation; report it as Conflict.
fn insert_error(err: sqlx::Error, resource_id: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(format!("Resource id {} already exists", resource_id))
    } else {
        err.into()
    }
}

/// PostgreSQL-backed metadata store
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl MetadataStore for PgMetadataStore {
    #[tracing::instrument(skip(self, record), fields(db.table = "resource_metadata", db.operation = "insert", db.record_id = %record.resource_id))]
    async fn insert(&self, record: &ResourceMetadata) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO resource_metadata
                (resource_id, source_id, name, storage_id, hash, content_type, size_in_bytes,
                 folder_height, file_count, node_type, scan_status, upload_status,
                 created_on, updated_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&record.resource_id)
        .bind(&record.source_id)
        .bind(&record.name)
        .bind(&record.storage_id)
        .bind(&record.hash)
        .bind(&record.content_type)
        .bind(record.size_in_bytes)
        .bind(record.folder_height)
        .bind(record.file_count)
        .bind(record.node_type)
        .bind(record.scan_status)
        .bind(record.upload_status)
        .bind(record.created_on)
        .bind(record.updated_on)
        .execute(&self.pool)
        .await;

        result
            .map(|_| ())
            .map_err(|e| insert_error(e, &record.resource_id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "select"))]
    async fn exists_by_id(&self, resource_id: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM resource_metadata WHERE resource_id = $1)",
        )
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "resource_metadata", db.operation = "update", db.record_id = %record.resource_id))]
    async fn save(&self, record: &ResourceMetadata) -> Result<ResourceMetadata, AppError> {
        let row = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            r#"
            UPDATE resource_metadata
            SET source_id = $2, name = $3, storage_id = $4, hash = $5, content_type = $6,
                size_in_bytes = $7, folder_height = $8, file_count = $9, scan_status = $10,
                upload_status = $11, updated_on = NOW()
            WHERE resource_id = $1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&record.resource_id)
        .bind(&record.source_id)
        .bind(&record.name)
        .bind(&record.storage_id)
        .bind(&record.hash)
        .bind(&record.content_type)
        .bind(record.size_in_bytes)
        .bind(record.folder_height)
        .bind(record.file_count)
        .bind(record.scan_status)
        .bind(record.upload_status)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ResourceMetadata::from).ok_or_else(|| {
            AppError::NotFound(format!("Resource metadata {} not found", record.resource_id))
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "delete"))]
    async fn delete(&self, resource_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM resource_metadata WHERE resource_id = $1")
            .bind(resource_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "update"))]
    async fn update_scan_status(
        &self,
        resource_id: &str,
        status: ScanStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE resource_metadata SET scan_status = $2, updated_on = $3 WHERE resource_id = $1",
        )
        .bind(resource_id)
        .bind(status)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "update"))]
    async fn update_size(
        &self,
        resource_id: &str,
        size_in_bytes: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        let row = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            "UPDATE resource_metadata SET size_in_bytes = $2, updated_on = $3 \
             WHERE resource_id = $1 RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(resource_id)
        .bind(size_in_bytes)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResourceMetadata::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "update"))]
    async fn update_name(
        &self,
        resource_id: &str,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        let row = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            "UPDATE resource_metadata SET name = COALESCE($2, name), updated_on = $3 \
             WHERE resource_id = $1 RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(resource_id)
        .bind(name)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResourceMetadata::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "update"))]
    async fn update_upload_status(
        &self,
        resource_id: &str,
        status: UploadStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE resource_metadata SET upload_status = $2, updated_on = $3 WHERE resource_id = $1",
        )
        .bind(resource_id)
        .bind(status)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "select"))]
    async fn find_by_id(
        &self,
        resource_id: &str,
        node_type: NodeType,
    ) -> Result<Option<ResourceMetadata>, AppError> {
        let row = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            "SELECT {} FROM resource_metadata WHERE resource_id = $1 AND node_type = $2",
            SELECT_COLUMNS
        ))
        .bind(resource_id)
        .bind(node_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResourceMetadata::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "select", count = resource_ids.len()))]
    async fn find_by_ids(
        &self,
        resource_ids: &[String],
        node_type: NodeType,
    ) -> Result<Vec<ResourceMetadata>, AppError> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            "SELECT {} FROM resource_metadata WHERE resource_id = ANY($1) AND node_type = $2",
            SELECT_COLUMNS
        ))
        .bind(resource_ids.to_vec())
        .bind(node_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResourceMetadata::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "resource_metadata", db.operation = "select"))]
    async fn find_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ResourceMetadata>, AppError> {
        let rows = sqlx::query_as::<Postgres, ResourceMetadataRow>(&format!(
            r#"
            SELECT {} FROM resource_metadata
            WHERE upload_status = 'PENDING' AND updated_on < $1
            ORDER BY updated_on ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResourceMetadata::from).collect())
    }
}
