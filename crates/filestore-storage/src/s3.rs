use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier, Tag, Tagging,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filestore_core::StoreSettings;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::error::{StorageError, StorageResult, TransportError};
use crate::traits::{ObjectTransport, TransportResult};
use crate::types::{DeleteFailure, ObjectEntry, ObjectStat, PutOptions, TransportStream};

/// S3 transport
///
/// Works against AWS S3 and S3-compatible providers (MinIO, etc.) when an endpoint
/// is configured. The SDK's own retries are disabled: the client applies its own
/// transport retry to put and stat, and every other call is single-shot.
#[derive(Clone)]
pub struct S3Transport {
    client: Client,
    min_part_size: u64,
}

impl S3Transport {
    pub async fn new(settings: &StoreSettings) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(settings.region.clone()));

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(RetryConfig::disabled());

        match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "filestore",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::ConfigError(
                    "access key and secret key must be set together".to_string(),
                ))
            }
        }

        let config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(ref endpoint) = settings.endpoint {
            // Path-style addressing is required by MinIO and most S3-compatible providers
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            min_part_size: settings.min_part_size,
        })
    }

    pub fn from_client(client: Client, min_part_size: u64) -> Self {
        Self {
            client,
            min_part_size,
        }
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> TransportResult<Option<String>> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(options.content_type.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_metadata(metadata_of(options))
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> TransportResult<Option<String>> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(options.content_type.clone())
            .set_content_disposition(options.content_disposition.clone())
            .set_metadata(metadata_of(options))
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| TransportError::Service("No upload ID returned from S3".to_string()))?
            .to_string();

        let parts = match self.upload_parts(bucket, key, &upload_id, body).await {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        error = %DisplayErrorContext(&abort_err),
                        bucket = %bucket,
                        key = %key,
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        body: Bytes,
    ) -> TransportResult<Vec<CompletedPart>> {
        let part_size = self.min_part_size.max(1) as usize;
        let mut parts = Vec::new();
        let mut offset = 0usize;
        let mut part_number = 1i32;

        while offset < body.len() {
            let end = (offset + part_size).min(body.len());
            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(body.slice(offset..end)))
                .send()
                .await
                .map_err(|e| classify(e, key))?;

            let etag = output.e_tag().ok_or_else(|| {
                TransportError::Service(format!("No ETag returned for part {}", part_number))
            })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            offset = end;
            part_number += 1;
        }

        Ok(parts)
    }
}

fn metadata_of(options: &PutOptions) -> Option<HashMap<String, String>> {
    if options.metadata.is_empty() {
        None
    } else {
        Some(options.metadata.clone())
    }
}

/// Map an SDK failure onto the transport taxonomy.
fn classify<E>(err: SdkError<E, HttpResponse>, key: &str) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            TransportError::Io(detail)
        }
        SdkError::ServiceError(service_err) => match service_err.err().code() {
            Some("NoSuchKey") | Some("NotFound") => TransportError::NoSuchKey(key.to_string()),
            None if service_err.raw().status().as_u16() == 404 => {
                TransportError::NoSuchKey(key.to_string())
            }
            _ => TransportError::Service(detail),
        },
        _ => TransportError::Service(detail),
    }
}

#[async_trait]
impl ObjectTransport for S3Transport {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> TransportResult<Option<String>> {
        let start = Instant::now();
        let size = body.len() as u64;
        let multipart = size > self.min_part_size;

        let result = if multipart {
            self.put_multipart(bucket, key, body, options).await
        } else {
            self.put_single(bucket, key, body, options).await
        };

        match &result {
            Ok(_) => tracing::info!(
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                multipart,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                multipart,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            ),
        }

        result
    }

    async fn get_object(&self, bucket: &str, key: &str) -> TransportResult<TransportStream> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        let bucket = bucket.to_string();
        let key = key.to_string();
        let stream = ReaderStream::new(response.body.into_async_read()).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                TransportError::Io(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        let mut headers = HashMap::new();
        if let Some(metadata) = output.metadata() {
            for (name, value) in metadata {
                headers.insert(format!("x-amz-meta-{}", name.to_lowercase()), value.clone());
            }
        }
        if let Some(content_type) = output.content_type() {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        if let Some(disposition) = output.content_disposition() {
            headers.insert("content-disposition".to_string(), disposition.to_string());
        }

        Ok(ObjectStat {
            key: key.to_string(),
            etag: output.e_tag().unwrap_or_default().trim_matches('"').to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            last_modified: output
                .last_modified()
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
            headers,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> TransportResult<Vec<DeleteFailure>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::Service(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| TransportError::Service(e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        Ok(output
            .errors()
            .iter()
            .map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_string(),
                message: e.message().unwrap_or("unknown error").to_string(),
            })
            .collect())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> TransportResult<()> {
        // URL-encode the copy source per AWS S3 API requirements
        let copy_source = format!("{}/{}", src_bucket, urlencoding::encode(src_key));

        self.client
            .copy_object()
            .bucket(dst_bucket)
            .copy_source(&copy_source)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| classify(e, src_key))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> TransportResult<Vec<ObjectEntry>> {
        let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if !recursive {
            request = request.delimiter("/");
        }

        let mut pages = request.into_paginator().send();
        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify(e, prefix))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                        is_dir: key.ends_with('/'),
                    });
                }
            }
            for common in page.common_prefixes() {
                if let Some(dir) = common.prefix() {
                    entries.push(ObjectEntry {
                        key: dir.to_string(),
                        size: 0,
                        is_dir: true,
                    });
                }
            }
        }

        Ok(entries)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        params: &HashMap<String, String>,
    ) -> TransportResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| TransportError::Service(e.to_string()))?;

        let mut request = self.client.get_object().bucket(bucket).key(key);
        for (name, value) in params {
            request = match name.to_lowercase().as_str() {
                "response-content-disposition" => request.response_content_disposition(value),
                "response-content-type" => request.response_content_type(value),
                "response-cache-control" => request.response_cache_control(value),
                "response-content-language" => request.response_content_language(value),
                other => {
                    tracing::debug!(param = %other, "Ignoring unsupported presign parameter");
                    request
                }
            };
        }

        let presigned = request
            .presigned(presigning_config)
            .await
            .map_err(|e| classify(e, key))?;

        Ok(presigned.uri().to_string())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> TransportResult<HashMap<String, String>> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, key))?;

        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    async fn put_tags(
        &self,
        bucket: &str,
        key: &str,
        tags: &HashMap<String, String>,
    ) -> TransportResult<()> {
        let tag_set = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::Service(e.to_string()))?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| TransportError::Service(e.to_string()))?;

        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| classify(e, key))?;
        Ok(())
    }
}
