use std::collections::HashMap;
use std::time::Duration;

use filestore_core::AppError;
use filestore_storage::ScanGate;

/// Issues presigned GET URLs behind the scan gate.
///
/// Expiry is carried by the signed URL itself; nothing is tracked here.
#[derive(Clone)]
pub struct PresignIssuer {
    gate: ScanGate,
}

impl PresignIssuer {
    pub fn new(gate: ScanGate) -> Self {
        Self { gate }
    }

    /// Presign `path` in the default bucket.
    ///
    /// `expiry` falls back to the configured default. `bypass_scan` skips the verdict
    /// check and is meant for trusted internal callers only.
    pub async fn presign(
        &self,
        path: &str,
        expiry: Option<Duration>,
        params: &HashMap<String, String>,
        bypass_scan: bool,
    ) -> Result<String, AppError> {
        let client = self.gate.client();
        let bucket = client.bucket_name();

        if bypass_scan {
            tracing::debug!(key = %path, "Presigning without scan check");
        } else {
            self.gate.ensure_readable(bucket, path).await?;
        }

        let expiry = expiry.unwrap_or_else(|| client.settings().presign_expiry());
        let url = client.presign(bucket, path, expiry, params).await?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            expires_in_secs = expiry.as_secs(),
            "Presigned URL issued"
        );
        Ok(url)
    }
}
