//! Object path building.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::PATH_DELIMITER;

/// Components of an object path: `<folder>/<file><.ext>`.
///
/// The folder defaults to the hex SHA-256 of the organisation id so that tenants
/// never share a prefix; the file name defaults to a random UUID.
#[derive(Debug, Clone, Default)]
pub struct FileUri {
    pub org_id: Option<String>,
    pub folder_name: Option<String>,
    pub file_name: Option<String>,
    pub extension: Option<String>,
}

impl FileUri {
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: Some(org_id.into()),
            ..Default::default()
        }
    }

    pub fn build_file_path(&self) -> String {
        build_uri(&self.folder(), &self.file())
    }

    fn folder(&self) -> String {
        match self.folder_name.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => folder.to_string(),
            _ => folder_hash(self.org_id.as_deref().unwrap_or_default()),
        }
    }

    fn file(&self) -> String {
        let base = match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        match self.extension.as_deref().map(str::trim) {
            Some(ext) if !ext.is_empty() && ext.starts_with('.') => format!("{}{}", base, ext),
            Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext),
            _ => base,
        }
    }
}

/// Hex SHA-256 of `value`, used as a tenant folder name.
pub fn folder_hash(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Join a folder and a file name with exactly one delimiter.
pub fn build_uri(folder: &str, file: &str) -> String {
    let folder = folder.trim_matches('/');
    let file = file.trim_start_matches('/');
    if folder.is_empty() {
        file.to_string()
    } else {
        format!("{}{}{}", folder, PATH_DELIMITER, file)
    }
}

/// Canonical object path of a resource's blob. Same id, same path.
pub fn resource_object_path(root_directory: &str, resource_id: &str) -> String {
    build_uri(root_directory, resource_id)
}

/// Last path segment of an object key.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(PATH_DELIMITER).next().unwrap_or(path)
}
