use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use filestore_core::constants::ZIP_CONTENT_TYPE;
use filestore_core::{detect_content_type, resource_object_path, AppError, ResourceMetadata};
use filestore_storage::{bytes_stream, collect_bytes, FileAndMetadata, ScanGate};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// One entry per resource id, keeping the last occurrence's record at the position
/// of the first.
fn dedupe_by_id(entries: Vec<ResourceMetadata>) -> Vec<ResourceMetadata> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ResourceMetadata> = Vec::with_capacity(entries.len());
    for entry in entries {
        match index.get(&entry.resource_id) {
            Some(&pos) => unique[pos] = entry,
            None => {
                index.insert(entry.resource_id.clone(), unique.len());
                unique.push(entry);
            }
        }
    }
    unique
}

/// Reserve an entry name not yet in `used`. Collisions get the resource id as a prefix,
/// then a counter if even that is taken.
fn unique_entry_name(used: &mut HashSet<String>, name: String, resource_id: &str) -> String {
    let mut candidate = name.clone();
    let mut attempt = 0u32;
    while used.contains(&candidate) {
        candidate = if attempt == 0 {
            format!("{}_{}", resource_id, name)
        } else {
            format!("{}_{}_{}", resource_id, attempt, name)
        };
        attempt += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Packs several resources into one zip bundle.
#[derive(Clone)]
pub struct BulkPackager {
    gate: ScanGate,
}

impl BulkPackager {
    pub fn new(gate: ScanGate) -> Self {
        Self { gate }
    }

    /// Build a bundle named `output_name` from `entries`.
    ///
    /// All or nothing: a scan rejection or read failure on any entry aborts the whole
    /// bundle. The archive is built in memory and its real length is reported.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn package(
        &self,
        entries: Vec<ResourceMetadata>,
        output_name: &str,
    ) -> Result<FileAndMetadata, AppError> {
        let content_type = detect_content_type(output_name);
        if content_type != ZIP_CONTENT_TYPE {
            return Err(AppError::BadRequest(format!(
                "Unsupported package-type (contentType: {}, name: {})",
                content_type, output_name
            )));
        }

        let client = self.gate.client();
        let bucket = client.bucket_name();
        let root = &client.settings().root_directory;

        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644);
            let mut used_names: HashSet<String> = HashSet::new();

            for entry in dedupe_by_id(entries) {
                let path = resource_object_path(root, &entry.resource_id);
                let file = self.gate.fetch(bucket, &path).await?;
                let data = collect_bytes(file.stream).await?;

                let entry_name = unique_entry_name(
                    &mut used_names,
                    sanitize_archive_filename(
                        &entry.name,
                        &format!("unnamed_{}", entry.resource_id),
                    ),
                    &entry.resource_id,
                );

                zip.start_file(entry_name.as_str(), options)
                    .with_context(|| format!("Failed to add file to ZIP: {}", entry_name))?;
                zip.write_all(&data)
                    .with_context(|| format!("Failed to write file data to ZIP: {}", entry_name))?;
            }

            zip.finish().context("Failed to finalize ZIP archive")?;
        }

        let bundle = ResourceMetadata::bundle(output_name, content_type, buffer.len() as u64);
        tracing::info!(
            name = %output_name,
            size_bytes = buffer.len(),
            "Bundle created"
        );
        Ok(FileAndMetadata::new(bundle, bytes_stream(Bytes::from(buffer))))
    }
}
