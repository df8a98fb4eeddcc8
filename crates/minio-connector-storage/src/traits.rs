//! Storage abstraction trait
//!
//! This module defines the Storage trait: the file-storage capability interface an
//! application programs against (save, open, url, exists, delete, size, ...).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::fmt;
use std::io;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Bucket error: {0}")]
    BucketError(String),

    #[error("No available name for {0}")]
    NameConflict(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Largest buffer reserved up front from a size hint
const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

/// Initial buffer capacity for a body of `size_hint` bytes
///
/// Hints come from callers or the server and are not trusted beyond `MAX_PREALLOCATION`.
pub(crate) fn initial_capacity(size_hint: Option<u64>) -> usize {
    size_hint
        .unwrap_or(0)
        .min(MAX_PREALLOCATION as u64) as usize
}

/// Object body as a stream of chunks
pub type ByteChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// An opened object.
///
/// The body is streamed from the server; the underlying connection is released when the
/// file is dropped or fully consumed.
pub struct StorageFile {
    name: String,
    size: Option<u64>,
    content_type: Option<String>,
    body: ByteChunkStream,
}

impl StorageFile {
    pub fn new(
        name: impl Into<String>,
        size: Option<u64>,
        content_type: Option<String>,
        body: ByteChunkStream,
    ) -> Self {
        StorageFile {
            name: name.into(),
            size,
            content_type,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size announced by the server, when known
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Read the whole body into memory
    pub async fn into_bytes(self) -> StorageResult<Vec<u8>> {
        let mut data = Vec::with_capacity(initial_capacity(self.size));
        let mut body = self.body;

        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }

        Ok(data)
    }

    pub fn into_stream(self) -> ByteChunkStream {
        self.body
    }

    /// Expose the body as an `AsyncRead`, e.g. to `tokio::io::copy` it into a file
    pub fn into_reader(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(
            self.body
                .map(|chunk: Result<Bytes, StorageError>| chunk.map_err(io::Error::other)),
        )
    }
}

impl fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Entries directly under a directory, relative to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// Storage abstraction trait
///
/// Names are object keys relative to the configured bucket. Implementations must be
/// usable behind `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `content` under `name` and return the name actually used
    ///
    /// The returned name differs from `name` when the backend refuses to overwrite an
    /// existing object and picks an available one instead.
    async fn save(&self, name: &str, content: Vec<u8>) -> StorageResult<String>;

    /// Store the content of a reader under `name` and return the name actually used
    ///
    /// Large uploads are sent without buffering the whole body in memory when the
    /// backend supports it.
    async fn save_stream(
        &self,
        name: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
    ) -> StorageResult<String>;

    /// Open a stored object for reading
    async fn open(&self, name: &str) -> StorageResult<StorageFile>;

    async fn delete(&self, name: &str) -> StorageResult<()>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Size in bytes
    async fn size(&self, name: &str) -> StorageResult<u64>;

    /// URL where a client can fetch the object directly
    async fn url(&self, name: &str) -> StorageResult<String>;

    /// List the directories and files directly under `path`
    async fn listdir(&self, path: &str) -> StorageResult<DirectoryListing>;

    /// Return a name based on `name` that is free and at most `max_length` bytes long
    async fn get_available_name(
        &self,
        name: &str,
        max_length: Option<usize>,
    ) -> StorageResult<String>;

    async fn accessed_time(&self, name: &str) -> StorageResult<DateTime<Utc>>;

    async fn created_time(&self, name: &str) -> StorageResult<DateTime<Utc>>;

    async fn modified_time(&self, name: &str) -> StorageResult<DateTime<Utc>>;
}
