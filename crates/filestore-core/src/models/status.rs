use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Kind of node a metadata record describes. Only files carry blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "node_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    File,
    Folder,
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NodeType::File => write!(f, "FILE"),
            NodeType::Folder => write!(f, "FOLDER"),
        }
    }
}

/// Antivirus verdict recorded against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "scan_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    NoFile,
    ScanningQueued,
    InScanning,
    Clean,
    Infected,
    ScanFailed,
    NotAssignable,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::NoFile => "NO_FILE",
            ScanStatus::ScanningQueued => "SCANNING_QUEUED",
            ScanStatus::InScanning => "IN_SCANNING",
            ScanStatus::Clean => "CLEAN",
            ScanStatus::Infected => "INFECTED",
            ScanStatus::ScanFailed => "SCAN_FAILED",
            ScanStatus::NotAssignable => "NOT_ASSIGNABLE",
        }
    }

    /// A processed verdict is final until a rescan is requested.
    pub fn is_processed(&self) -> bool {
        matches!(self, ScanStatus::Clean | ScanStatus::Infected)
    }

    /// Whether a record currently in `self` may move to `next`.
    pub fn allows_transition_to(&self, next: ScanStatus) -> bool {
        !self.is_processed() || next == ScanStatus::ScanningQueued
    }
}

impl FromStr for ScanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NO_FILE" => Ok(ScanStatus::NoFile),
            "SCANNING_QUEUED" => Ok(ScanStatus::ScanningQueued),
            "IN_SCANNING" => Ok(ScanStatus::InScanning),
            "CLEAN" => Ok(ScanStatus::Clean),
            "INFECTED" => Ok(ScanStatus::Infected),
            "SCAN_FAILED" => Ok(ScanStatus::ScanFailed),
            "NOT_ASSIGNABLE" => Ok(ScanStatus::NotAssignable),
            _ => Err(anyhow::anyhow!("Invalid scan status: {}", s)),
        }
    }
}

impl Display for ScanStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Upload progress of a resource. A failed upload leaves no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "upload_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Completed,
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Pending => write!(f, "PENDING"),
            UploadStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}
