//! Object client seam
//!
//! `ObjectClient` lists the S3 calls the MinIO adapter relies on. The adapter never
//! talks to the SDK directly, so the same storage logic runs against a real server
//! (`S3ObjectClient`) or against memory (`MemoryClient`).

use crate::traits::{StorageFile, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Object metadata returned by a HEAD request or a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

/// Result of a (possibly delimited) listing
///
/// `prefixes` are the common prefixes, delimiter included, as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub prefixes: Vec<String>,
    pub objects: Vec<ObjectStat>,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Create a bucket, in `region` when one is given
    async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> StorageResult<()>;

    /// Replace the bucket policy with the given JSON document
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StorageResult<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Upload from a reader and return the number of bytes stored
    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
        content_type: Option<&str>,
    ) -> StorageResult<u64>;

    /// Fails with `StorageError::NotFound` when the object does not exist
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StorageFile>;

    /// Fails with `StorageError::NotFound` when the object does not exist
    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectStat>;

    /// Removing a missing object is not an error
    async fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// List objects under `prefix`, grouping deeper keys by `delimiter` when given
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<ObjectListing>;
}
