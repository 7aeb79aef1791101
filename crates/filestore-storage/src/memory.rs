//! In-process object store
//!
//! Keeps objects in a map keyed by (bucket, key). Besides serving local runs it
//! records how often each operation was called and can be told to fail upcoming
//! calls, which makes retry and rollback behaviour observable.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::traits::{ObjectTransport, TransportResult};
use crate::types::{DeleteFailure, ObjectEntry, ObjectStat, PutOptions, TransportStream};

/// Operations that can be counted and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Put,
    Get,
    Head,
    Delete,
    DeleteMany,
    Copy,
    List,
    Presign,
    GetTags,
    PutTags,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    headers: HashMap<String, String>,
    tags: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            content_type: None,
            headers: HashMap::new(),
            tags: HashMap::new(),
            last_modified: Utc::now(),
        }
    }
}

/// Content hash standing in for the store-assigned etag.
fn etag_of(data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    digest[..32].to_string()
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    calls: HashMap<TransportOp, usize>,
    failures: HashMap<TransportOp, VecDeque<TransportError>>,
}

impl State {
    /// Count the call and pop an injected failure, if any.
    fn enter(&mut self, op: TransportOp) -> TransportResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn object(&self, bucket: &str, key: &str) -> TransportResult<&StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| TransportError::NoSuchKey(key.to_string()))
    }

    fn object_mut(&mut self, bucket: &str, key: &str) -> TransportResult<&mut StoredObject> {
        self.objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| TransportError::NoSuchKey(key.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing call accounting.
    pub async fn insert_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let mut state = self.state.lock().await;
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject::new(data.into()),
        );
    }

    /// Set a stored header (keys are lowercased). No-op for unknown objects.
    pub async fn set_header(&self, bucket: &str, key: &str, name: &str, value: &str) {
        let mut state = self.state.lock().await;
        if let Ok(object) = state.object_mut(bucket, key) {
            object
                .headers
                .insert(name.to_lowercase(), value.to_string());
        }
    }

    /// Set one tag. No-op for unknown objects.
    pub async fn set_tag(&self, bucket: &str, key: &str, name: &str, value: &str) {
        let mut state = self.state.lock().await;
        if let Ok(object) = state.object_mut(bucket, key) {
            object.tags.insert(name.to_string(), value.to_string());
        }
    }

    /// Fail the next `times` calls of `op` with `err`.
    pub async fn fail_next(&self, op: TransportOp, err: TransportError, times: usize) {
        let mut state = self.state.lock().await;
        let queue = state.failures.entry(op).or_default();
        queue.extend(std::iter::repeat(err).take(times));
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    pub async fn calls(&self, op: TransportOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or_default()
    }

    pub async fn object_bytes(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let state = self.state.lock().await;
        state.object(bucket, key).ok().map(|o| o.data.clone())
    }

    pub async fn object_tags(&self, bucket: &str, key: &str) -> Option<HashMap<String, String>> {
        let state = self.state.lock().await;
        state.object(bucket, key).ok().map(|o| o.tags.clone())
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> TransportResult<Option<String>> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Put)?;

        let etag = etag_of(&body);
        let mut object = StoredObject::new(body);
        object.content_type = options.content_type.clone();
        for (name, value) in &options.metadata {
            object
                .headers
                .insert(format!("x-amz-meta-{}", name.to_lowercase()), value.clone());
        }
        if let Some(ref content_type) = options.content_type {
            object
                .headers
                .insert("content-type".to_string(), content_type.clone());
        }
        if let Some(ref disposition) = options.content_disposition {
            object
                .headers
                .insert("content-disposition".to_string(), disposition.clone());
        }
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), object);

        Ok(Some(etag))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> TransportResult<TransportStream> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Get)?;
        let data = state.object(bucket, key)?.data.clone();
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectStat> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Head)?;
        let object = state.object(bucket, key)?;
        Ok(ObjectStat {
            key: key.to_string(),
            etag: etag_of(&object.data),
            size: object.data.len() as u64,
            content_type: object.content_type.clone(),
            last_modified: Some(object.last_modified),
            headers: object.headers.clone(),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Delete)?;
        // S3 deletes are idempotent: removing a missing key succeeds.
        state.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> TransportResult<Vec<DeleteFailure>> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::DeleteMany)?;
        for key in keys {
            state.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(Vec::new())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Copy)?;
        let mut copy = state.object(src_bucket, src_key)?.clone();
        copy.last_modified = Utc::now();
        state
            .objects
            .insert((dst_bucket.to_string(), dst_key.to_string()), copy);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> TransportResult<Vec<ObjectEntry>> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::List)?;

        let mut entries: Vec<ObjectEntry> = Vec::new();
        let mut dirs: Vec<String> = Vec::new();
        for ((object_bucket, key), object) in &state.objects {
            if object_bucket != bucket || !key.starts_with(prefix) {
                continue;
            }
            let rest = &key[prefix.len()..];
            match rest.find('/') {
                Some(idx) if !recursive => {
                    let dir = format!("{}{}", prefix, &rest[..=idx]);
                    if !dirs.contains(&dir) {
                        dirs.push(dir);
                    }
                }
                _ => entries.push(ObjectEntry {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    is_dir: key.ends_with('/'),
                }),
            }
        }
        entries.extend(dirs.into_iter().map(|key| ObjectEntry {
            key,
            size: 0,
            is_dir: true,
        }));
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        params: &HashMap<String, String>,
    ) -> TransportResult<String> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::Presign)?;
        state.object(bucket, key)?;

        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        query.sort();
        query.insert(0, format!("X-Amz-Expires={}", expires_in.as_secs()));
        Ok(format!("memory://{}/{}?{}", bucket, key, query.join("&")))
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> TransportResult<HashMap<String, String>> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::GetTags)?;
        Ok(state.object(bucket, key)?.tags.clone())
    }

    async fn put_tags(
        &self,
        bucket: &str,
        key: &str,
        tags: &HashMap<String, String>,
    ) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        state.enter(TransportOp::PutTags)?;
        state.object_mut(bucket, key)?.tags = tags.clone();
        Ok(())
    }
}
