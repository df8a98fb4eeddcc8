//! Test helpers: an `ObjectClient` that records every call on top of `MemoryClient`.
//!
//! Run from workspace root: `cargo test -p minio-connector-storage`.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use minio_connector_storage::{
    MemoryClient, MinioSettings, MinioStorage, ObjectClient, ObjectListing, ObjectStat,
    StorageError, StorageFile, StorageResult,
};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::Notify;

pub const BUCKET: &str = "test-bucket";

/// Calls received by a `RecordingClient`, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BucketExists(String),
    MakeBucket(String, Option<String>),
    SetBucketPolicy(String, String),
    PutObject {
        bucket: String,
        key: String,
        size: usize,
        content_type: Option<String>,
    },
    PutObjectStream {
        bucket: String,
        key: String,
        content_type: Option<String>,
    },
    GetObject(String, String),
    StatObject(String, String),
    RemoveObject(String, String),
    PresignedGetObject {
        bucket: String,
        key: String,
        expires_secs: u64,
    },
    ListObjects {
        bucket: String,
        prefix: String,
        delimiter: Option<String>,
    },
}

#[derive(Default)]
pub struct RecordingClient {
    inner: MemoryClient,
    calls: Mutex<Vec<Call>>,
    stat_failure: Mutex<Option<String>>,
    stat_gate: Mutex<Option<StatGate>>,
}

/// Pauses a stat between reading the object and returning the result
#[derive(Clone, Default)]
pub struct StatGate {
    /// Notified once the object has been read
    pub read: Arc<Notify>,
    /// Awaited before the result is returned
    pub release: Arc<Notify>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Client whose bucket already exists
    pub async fn with_bucket() -> Arc<Self> {
        let client = Self::new();
        client.inner.make_bucket(BUCKET, None).await.unwrap();
        client
    }

    pub fn inner(&self) -> &MemoryClient {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn stat_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::StatObject(..)))
            .count()
    }

    pub fn put_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::PutObject { .. } | Call::PutObjectStream { .. }))
            .collect()
    }

    /// Make every following stat fail with a backend error
    pub fn fail_stats_with(&self, message: &str) {
        *self.stat_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Pause the next stat until `release` is notified
    pub fn hold_next_stat(&self) -> StatGate {
        let gate = StatGate::default();
        *self.stat_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Store an object without recording a call
    pub async fn seed(&self, key: &str, data: &[u8]) {
        self.inner
            .put_object(BUCKET, key, Bytes::copy_from_slice(data), None)
            .await
            .unwrap();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectClient for RecordingClient {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.record(Call::BucketExists(bucket.to_string()));
        self.inner.bucket_exists(bucket).await
    }

    async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> StorageResult<()> {
        self.record(Call::MakeBucket(bucket.to_string(), region.map(String::from)));
        self.inner.make_bucket(bucket, region).await
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StorageResult<()> {
        self.record(Call::SetBucketPolicy(bucket.to_string(), policy.to_string()));
        self.inner.set_bucket_policy(bucket, policy).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.record(Call::PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len(),
            content_type: content_type.map(String::from),
        });
        self.inner.put_object(bucket, key, data, content_type).await
    }

    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
        content_type: Option<&str>,
    ) -> StorageResult<u64> {
        self.record(Call::PutObjectStream {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.map(String::from),
        });
        self.inner
            .put_object_stream(bucket, key, reader, content_length, content_type)
            .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StorageFile> {
        self.record(Call::GetObject(bucket.to_string(), key.to_string()));
        self.inner.get_object(bucket, key).await
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectStat> {
        self.record(Call::StatObject(bucket.to_string(), key.to_string()));
        let failure = self.stat_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(StorageError::BackendError(message));
        }
        let result = self.inner.stat_object(bucket, key).await;

        let gate = self.stat_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.read.notify_one();
            gate.release.notified().await;
        }

        result
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(Call::RemoveObject(bucket.to_string(), key.to_string()));
        self.inner.remove_object(bucket, key).await
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.record(Call::PresignedGetObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            expires_secs: expires_in.as_secs(),
        });
        self.inner.presigned_get_object(bucket, key, expires_in).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<ObjectListing> {
        self.record(Call::ListObjects {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: delimiter.map(String::from),
        });
        self.inner.list_objects(bucket, prefix, delimiter).await
    }
}

/// Settings pointing at a plain-HTTP test server
pub fn test_settings() -> MinioSettings {
    let mut settings = MinioSettings::new(
        "test.minio.server",
        "test_access_key",
        "test_secret_key",
        BUCKET,
    );
    settings.secure = false;
    settings
}

pub async fn connect(settings: MinioSettings, client: &Arc<RecordingClient>) -> MinioStorage {
    MinioStorage::connect(settings, client.clone() as Arc<dyn ObjectClient>)
        .await
        .unwrap()
}
