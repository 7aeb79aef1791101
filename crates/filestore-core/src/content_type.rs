//! Content-type detection from declared file names.
//!
//! This is a local, deterministic lookup on the name's extension. It never reads
//! the bytes and is not a substitute for the antivirus scan.

/// MIME type for `name`, falling back to `application/octet-stream`.
pub fn detect_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
