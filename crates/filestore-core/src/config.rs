//! Configuration module
//!
//! Object store and database settings loaded from the environment. Values are read
//! with a `FILESTORE_` prefix; a `.env` file is honoured when present.
//!
//! Named clients are declared with `FILESTORE_CLIENTS=archive,reports`. Each one may
//! override any store setting through `FILESTORE_CLIENT_<NAME>_<FIELD>` (for example
//! `FILESTORE_CLIENT_ARCHIVE_BUCKET_NAME`); unset or blank fields fall back to the
//! default settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::MIN_MULTIPART_PART_SIZE;

const ENV_PREFIX: &str = "FILESTORE_";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ROOT_DIRECTORY: &str = "images";
const PRESIGN_EXPIRY_SECS: u64 = 3600;
const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_FIXED_BACKOFF_MS: u64 = 500;
const UPLOAD_RETRY_MAX_ATTEMPTS: u32 = 3;
const DB_MAX_CONNECTIONS: u32 = 20;

/// Settings for one object store client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSettings {
    /// Custom endpoint for S3-compatible providers (MinIO, etc.).
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub bucket_name: String,
    /// Prefix under which resource blobs are written.
    pub root_directory: String,
    pub presign_expiry_secs: u64,
    /// Bodies larger than this go through multipart upload, in parts of this size.
    pub min_part_size: u64,
    /// Transport-level attempts for put and stat.
    pub retry_max_attempts: u32,
    pub retry_fixed_backoff_ms: u64,
    /// Upload-level attempts when the transfer comes up short.
    pub upload_retry_max_attempts: u32,
}

impl StoreSettings {
    /// Defaults for `bucket_name`, everything else at its documented default.
    pub fn for_bucket(bucket_name: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: DEFAULT_REGION.to_string(),
            bucket_name: bucket_name.into(),
            root_directory: DEFAULT_ROOT_DIRECTORY.to_string(),
            presign_expiry_secs: PRESIGN_EXPIRY_SECS,
            min_part_size: MIN_MULTIPART_PART_SIZE,
            retry_max_attempts: RETRY_MAX_ATTEMPTS,
            retry_fixed_backoff_ms: RETRY_FIXED_BACKOFF_MS,
            upload_retry_max_attempts: UPLOAD_RETRY_MAX_ATTEMPTS,
        }
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_fixed_backoff_ms)
    }

    /// Copy of these settings with every set, non-blank override applied.
    pub fn with_overrides(&self, overrides: &StoreSettingsOverrides) -> Self {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            endpoint: text(&overrides.endpoint).or_else(|| self.endpoint.clone()),
            access_key: text(&overrides.access_key).or_else(|| self.access_key.clone()),
            secret_key: text(&overrides.secret_key).or_else(|| self.secret_key.clone()),
            region: text(&overrides.region).unwrap_or_else(|| self.region.clone()),
            bucket_name: text(&overrides.bucket_name).unwrap_or_else(|| self.bucket_name.clone()),
            root_directory: text(&overrides.root_directory)
                .unwrap_or_else(|| self.root_directory.clone()),
            presign_expiry_secs: overrides
                .presign_expiry_secs
                .unwrap_or(self.presign_expiry_secs),
            min_part_size: overrides.min_part_size.unwrap_or(self.min_part_size),
            retry_max_attempts: overrides
                .retry_max_attempts
                .unwrap_or(self.retry_max_attempts),
            retry_fixed_backoff_ms: overrides
                .retry_fixed_backoff_ms
                .unwrap_or(self.retry_fixed_backoff_ms),
            upload_retry_max_attempts: overrides
                .upload_retry_max_attempts
                .unwrap_or(self.upload_retry_max_attempts),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bucket_name.trim().is_empty() {
            return Err(anyhow::anyhow!("FILESTORE_S3_BUCKET must be set"));
        }
        if self.retry_max_attempts == 0 || self.upload_retry_max_attempts == 0 {
            return Err(anyhow::anyhow!("Retry max attempts must be at least 1"));
        }
        if self.min_part_size < MIN_MULTIPART_PART_SIZE {
            return Err(anyhow::anyhow!(
                "FILESTORE_MIN_PART_SIZE must be at least {} bytes",
                MIN_MULTIPART_PART_SIZE
            ));
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(anyhow::anyhow!(
                "FILESTORE_S3_ACCESS_KEY and FILESTORE_S3_SECRET_KEY must be set together"
            ));
        }
        Ok(())
    }
}

/// Per-client overrides. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct StoreSettingsOverrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub bucket_name: Option<String>,
    pub root_directory: Option<String>,
    pub presign_expiry_secs: Option<u64>,
    pub min_part_size: Option<u64>,
    pub retry_max_attempts: Option<u32>,
    pub retry_fixed_backoff_ms: Option<u64>,
    pub upload_retry_max_attempts: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    pub store: StoreSettings,
    pub clients: HashMap<String, StoreSettingsOverrides>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl FileStoreConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let get = |key: &str| vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned();
        let parse = |key: &str, default: u64| -> Result<u64, anyhow::Error> {
            match get(key) {
                Some(raw) if !raw.trim().is_empty() => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{}{} must be a valid number", ENV_PREFIX, key)),
                _ => Ok(default),
            }
        };

        let bucket_name = get("S3_BUCKET")
            .ok_or_else(|| anyhow::anyhow!("FILESTORE_S3_BUCKET must be set"))?;

        let store = StoreSettings {
            endpoint: get("S3_ENDPOINT"),
            access_key: get("S3_ACCESS_KEY"),
            secret_key: get("S3_SECRET_KEY"),
            region: get("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket_name,
            root_directory: get("S3_ROOT_DIRECTORY")
                .unwrap_or_else(|| DEFAULT_ROOT_DIRECTORY.to_string()),
            presign_expiry_secs: parse("PRESIGN_EXPIRY_SECS", PRESIGN_EXPIRY_SECS)?,
            min_part_size: parse("MIN_PART_SIZE", MIN_MULTIPART_PART_SIZE)?,
            retry_max_attempts: parse("RETRY_MAX_ATTEMPTS", RETRY_MAX_ATTEMPTS as u64)? as u32,
            retry_fixed_backoff_ms: parse("RETRY_FIXED_BACKOFF_MS", RETRY_FIXED_BACKOFF_MS)?,
            upload_retry_max_attempts: parse(
                "UPLOAD_RETRY_MAX_ATTEMPTS",
                UPLOAD_RETRY_MAX_ATTEMPTS as u64,
            )? as u32,
        };

        let mut clients = HashMap::new();
        if let Some(names) = get("CLIENTS") {
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let prefix = format!("{}CLIENT_{}_", ENV_PREFIX, name.to_uppercase());
                let overrides = envy::prefixed(prefix.clone())
                    .from_iter::<_, StoreSettingsOverrides>(
                        vars.iter().map(|(k, v)| (k.clone(), v.clone())),
                    )
                    .map_err(|e| anyhow::anyhow!("Invalid settings under {}*: {}", prefix, e))?;
                clients.insert(name.to_lowercase(), overrides);
            }
        }

        Ok(Self {
            store,
            clients,
            database_url: get("DATABASE_URL").or_else(|| vars.get("DATABASE_URL").cloned()),
            db_max_connections: parse("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS as u64)? as u32,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.store.validate()?;
        for name in self.clients.keys() {
            self.client_settings(name)?.validate()?;
        }
        Ok(())
    }

    /// Settings for a named client: its overrides merged over the defaults.
    pub fn client_settings(&self, name: &str) -> Result<StoreSettings, anyhow::Error> {
        self.clients
            .get(&name.to_lowercase())
            .map(|overrides| self.store.with_overrides(overrides))
            .ok_or_else(|| anyhow::anyhow!("No object store client configured as '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config = FileStoreConfig::from_vars(&vars(&[("FILESTORE_S3_BUCKET", "files")])).unwrap();
        assert_eq!(config.store, StoreSettings::for_bucket("files"));
        assert_eq!(config.store.presign_expiry(), Duration::from_secs(3600));
        assert!(config.clients.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_bucket_is_an_error() {
        assert!(FileStoreConfig::from_vars(&HashMap::new()).is_err());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let result = FileStoreConfig::from_vars(&vars(&[
            ("FILESTORE_S3_BUCKET", "files"),
            ("FILESTORE_RETRY_MAX_ATTEMPTS", "lots"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_named_client_falls_back_to_defaults() {
        let config = FileStoreConfig::from_vars(&vars(&[
            ("FILESTORE_S3_BUCKET", "files"),
            ("FILESTORE_UPLOAD_RETRY_MAX_ATTEMPTS", "5"),
            ("FILESTORE_CLIENTS", "archive"),
            ("FILESTORE_CLIENT_ARCHIVE_BUCKET_NAME", "archive-bucket"),
            ("FILESTORE_CLIENT_ARCHIVE_REGION", "  "),
            ("FILESTORE_CLIENT_ARCHIVE_RETRY_MAX_ATTEMPTS", "7"),
        ]))
        .unwrap();

        let archive = config.client_settings("archive").unwrap();
        assert_eq!(archive.bucket_name, "archive-bucket");
        assert_eq!(archive.retry_max_attempts, 7);
        // blank and unset fields come from the defaults
        assert_eq!(archive.region, "us-east-1");
        assert_eq!(archive.upload_retry_max_attempts, 5);
        assert_eq!(archive.min_part_size, MIN_MULTIPART_PART_SIZE);
    }

    #[test]
    fn test_unknown_client_is_an_error() {
        let config = FileStoreConfig::from_vars(&vars(&[("FILESTORE_S3_BUCKET", "files")])).unwrap();
        assert!(config.client_settings("reports").is_err());
    }

    #[test]
    fn test_validate_rejects_small_parts() {
        let mut settings = StoreSettings::for_bucket("files");
        settings.min_part_size = 1024;
        assert!(settings.validate().is_err());
    }
}
