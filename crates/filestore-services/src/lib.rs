//! Filestore Services Layer
//!
//! This crate coordinates the metadata store and the object store: uploads with
//! reservation and compensation, scan-gated reads, bulk packaging, presigning, and
//! reconciliation of uploads left PENDING. [`FileService`] is the facade a request
//! layer calls; the individual coordinators are exposed for callers that need only
//! one of them.

pub mod archive;
pub mod file_service;
pub mod presign;
pub mod upload;

pub use archive::BulkPackager;
pub use file_service::FileService;
pub use presign::PresignIssuer;
pub use upload::{ReconcileReport, UploadCoordinator};

pub use filestore_db::{InMemoryMetadataStore, MetadataStore, PgMetadataStore};
pub use filestore_storage::{
    create_client, create_named_client, ByteStream, FileAndMetadata, ObjectStoreClient,
    ScanGate, StorageError, StorageResult,
};
