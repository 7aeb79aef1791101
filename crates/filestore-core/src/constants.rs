//! Shared constants: antivirus markers, object path layout, and operation error codes.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Tag (and legacy header) carrying the antivirus verdict of an object.
pub const AV_STATUS: &str = "x-amz-meta-av-status";

/// Tag (and legacy header) carrying the time the verdict was written.
pub const AV_TIMESTAMP: &str = "x-amz-meta-av-timestamp";

/// Verdict value that blocks every read, compared case-insensitively.
pub const AV_STATUS_INFECTED: &str = "infected";

pub const PATH_DELIMITER: &str = "/";

/// Content type of the only bundle format we can produce.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// S3 rejects multipart parts smaller than 5 MiB (except the last one).
pub const MIN_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Operation-specific error codes attached to storage failures.
///
/// The string forms are stable: they show up in logs and client payloads, and the
/// upload retry classifier keys off [`ErrorCode::Save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Bytes could not be transferred to the object store.
    Save,
    GetMetadata,
    Get,
    Copy,
    Remove,
    StatusAbsent,
    StatusInfected,
    GetPresigned,
    ScanFileNotFound,
    GetFilesName,
    SaveTags,
    GetTags,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Save => "binary.data.save.error",
            ErrorCode::GetMetadata => "binary.data.get.metadata.error",
            ErrorCode::Get => "binary.data.get.error",
            ErrorCode::Copy => "binary.data.copy.error",
            ErrorCode::Remove => "binary.data.remove.error",
            ErrorCode::StatusAbsent => "binary.data.get.metadata.status.absent",
            ErrorCode::StatusInfected => "binary.data.get.metadata.status.infected",
            ErrorCode::GetPresigned => "binary.data.get.presigned.object.error",
            ErrorCode::ScanFileNotFound => "scan.file.not.found",
            ErrorCode::GetFilesName => "binary.data.get.files.name.error",
            ErrorCode::SaveTags => "binary.data.save.file.tags.error",
            ErrorCode::GetTags => "binary.data.get.file.tags.error",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
