//! In-memory object client
//!
//! Keeps buckets and objects in process memory with the same observable contract as
//! `S3ObjectClient`: missing objects are `NotFound`, removing a missing object
//! succeeds, writes to a missing bucket fail.

use crate::client::{ObjectClient, ObjectListing, ObjectStat};
use crate::traits::{initial_capacity, StorageError, StorageFile, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::pin::Pin;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryBucket {
    objects: BTreeMap<String, MemoryObject>,
    policy: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryClient {
    buckets: RwLock<HashMap<String, MemoryBucket>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current policy document of `bucket`, if one was set
    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        self.read()
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    /// Region `bucket` was created in, if one was given
    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        self.read()
            .get(bucket)
            .and_then(|b| b.region.clone())
    }

    /// Keys stored in `bucket`, in lexicographic order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.read()
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    // Every update is a single insert or remove; poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MemoryBucket>> {
        self.buckets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MemoryBucket>> {
        self.buckets.write().unwrap_or_else(|e| e.into_inner())
    }

    fn no_such_bucket(bucket: &str) -> StorageError {
        StorageError::BucketError(format!("NoSuchBucket: {}", bucket))
    }

    fn store(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let mut buckets = self.write();
        let target = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;

        target.objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.map(String::from),
                last_modified: Utc::now(),
            },
        );

        Ok(())
    }

    fn lookup(&self, bucket: &str, key: &str) -> StorageResult<MemoryObject> {
        let buckets = self.read();
        let source = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;

        source
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

fn stat_of(key: &str, object: &MemoryObject) -> ObjectStat {
    ObjectStat {
        key: key.to_string(),
        size: object.data.len() as u64,
        last_modified: Some(object.last_modified),
        etag: None,
        content_type: object.content_type.clone(),
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self.read().contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> StorageResult<()> {
        let mut buckets = self.write();
        buckets.entry(bucket.to_string()).or_insert_with(|| MemoryBucket {
            region: region.map(String::from),
            ..MemoryBucket::default()
        });
        Ok(())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StorageResult<()> {
        let mut buckets = self.write();
        let target = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        target.policy = Some(policy.to_string());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.store(bucket, key, data, content_type)
    }

    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
        content_type: Option<&str>,
    ) -> StorageResult<u64> {
        let mut buffer = Vec::with_capacity(initial_capacity(content_length));
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        let size = buffer.len() as u64;
        self.store(bucket, key, Bytes::from(buffer), content_type)?;
        Ok(size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StorageFile> {
        let object = self.lookup(bucket, key)?;
        let size = object.data.len() as u64;
        let body = futures::stream::once(async move { Ok::<Bytes, StorageError>(object.data) });

        Ok(StorageFile::new(
            key,
            Some(size),
            object.content_type,
            Box::pin(body),
        ))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectStat> {
        let object = self.lookup(bucket, key)?;
        Ok(stat_of(key, &object))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut buckets = self.write();
        let target = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;
        target.objects.remove(key);
        Ok(())
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<ObjectListing> {
        let buckets = self.read();
        let source = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?;

        let mut prefixes = BTreeSet::new();
        let mut objects = Vec::new();

        for (key, object) in source.objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };

            match delimiter.filter(|d| !d.is_empty()).and_then(|d| {
                rest.find(d).map(|pos| pos + d.len())
            }) {
                Some(end) => {
                    prefixes.insert(format!("{}{}", prefix, &rest[..end]));
                }
                None => objects.push(stat_of(key, object)),
            }
        }

        Ok(ObjectListing {
            prefixes: prefixes.into_iter().collect(),
            objects,
        })
    }
}
