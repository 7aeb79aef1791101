//! Domain models for stored resources.

pub mod resource;
pub mod status;

pub use resource::{FileStat, NewResource, ResourceMetadata, ResourcePatch};
pub use status::{NodeType, ScanStatus, UploadStatus};
