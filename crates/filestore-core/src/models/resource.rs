use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{NodeType, ScanStatus, UploadStatus};

/// Durable record of a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub resource_id: String,
    pub source_id: Option<String>,
    pub name: String,
    /// External-facing alias of the resource.
    pub storage_id: String,
    pub hash: Option<String>,
    pub content_type: String,
    pub size_in_bytes: i64,
    pub folder_height: i32,
    pub file_count: i32,
    pub node_type: NodeType,
    pub scan_status: ScanStatus,
    pub upload_status: UploadStatus,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Caller-supplied description of a file about to be uploaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResource {
    pub resource_id: Option<String>,
    pub source_id: Option<String>,
    pub name: String,
    pub storage_id: Option<String>,
    pub hash: Option<String>,
    /// Declared size. Replaced by the stored size once the blob is written.
    pub size_in_bytes: i64,
    pub folder_height: i32,
    pub file_count: i32,
}

impl NewResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_declared_size(mut self, size_in_bytes: i64) -> Self {
        self.size_in_bytes = size_in_bytes;
        self
    }

    /// Supplied id, if it is not blank.
    pub fn requested_id(&self) -> Option<&str> {
        non_blank(self.resource_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ResourceMetadata {
    /// Build the PENDING reservation row for an upload, generating any missing ids.
    pub fn reserve(request: NewResource, content_type: impl Into<String>) -> Self {
        let now = Utc::now();
        let resource_id = non_blank(request.resource_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let storage_id = non_blank(request.storage_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            resource_id,
            source_id: request.source_id,
            name: request.name,
            storage_id,
            hash: request.hash,
            content_type: content_type.into(),
            size_in_bytes: request.size_in_bytes,
            folder_height: request.folder_height,
            file_count: request.file_count,
            node_type: NodeType::File,
            scan_status: ScanStatus::NoFile,
            upload_status: UploadStatus::Pending,
            created_on: now,
            updated_on: now,
        }
    }

    /// Synthetic, never persisted record describing a generated bundle.
    pub fn bundle(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        Self {
            resource_id: id.clone(),
            source_id: None,
            name: name.into(),
            storage_id: id,
            hash: None,
            content_type: content_type.into(),
            size_in_bytes: i64::try_from(size).unwrap_or(i64::MAX),
            folder_height: 0,
            file_count: 0,
            node_type: NodeType::File,
            scan_status: ScanStatus::NotAssignable,
            upload_status: UploadStatus::Completed,
            created_on: now,
            updated_on: now,
        }
    }
}

/// Partial update of a resource. Only the name is patchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePatch {
    pub name: Option<String>,
}

impl ResourcePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Object-store view of a resource combined with its recorded verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub etag: String,
    pub length: u64,
    pub content_type: Option<String>,
    pub scan_status: ScanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_generates_missing_ids() {
        let record = ResourceMetadata::reserve(NewResource::new("report.pdf"), "application/pdf");
        assert!(Uuid::parse_str(&record.resource_id).is_ok());
        assert!(Uuid::parse_str(&record.storage_id).is_ok());
        assert_ne!(record.resource_id, record.storage_id);
        assert_eq!(record.upload_status, UploadStatus::Pending);
        assert_eq!(record.scan_status, ScanStatus::NoFile);
        assert_eq!(record.node_type, NodeType::File);
    }

    #[test]
    fn test_reserve_keeps_supplied_id() {
        let request = NewResource::new("a.txt")
            .with_resource_id("res-1")
            .with_declared_size(42);
        let record = ResourceMetadata::reserve(request, "text/plain");
        assert_eq!(record.resource_id, "res-1");
        assert_eq!(record.size_in_bytes, 42);
        assert_eq!(record.content_type, "text/plain");
    }

    #[test]
    fn test_blank_id_is_treated_as_absent() {
        let request = NewResource::new("a.txt").with_resource_id("   ");
        assert_eq!(request.requested_id(), None);
        let record = ResourceMetadata::reserve(request, "text/plain");
        assert!(Uuid::parse_str(&record.resource_id).is_ok());
    }
}
