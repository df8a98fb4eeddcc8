use anyhow::Context;
use chrono::{DateTime, Utc};
use minio_connector_storage::{DirectoryListing, ObjectStat, StorageFile};
use serde::Serialize;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Object metadata as printed by `stat`
#[derive(Debug, Serialize)]
pub struct StatOutput {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

impl From<ObjectStat> for StatOutput {
    fn from(stat: ObjectStat) -> Self {
        Self {
            name: stat.key,
            size: stat.size,
            last_modified: stat.last_modified,
            etag: stat.etag,
            content_type: stat.content_type,
        }
    }
}

/// Directory listing as printed by `ls`
#[derive(Debug, Serialize)]
pub struct ListingOutput {
    pub path: String,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl ListingOutput {
    pub fn new(path: &str, listing: DirectoryListing) -> Self {
        Self {
            path: path.to_string(),
            directories: listing.directories,
            files: listing.files,
        }
    }
}

/// Object name for an upload: the explicit name, else the file name of `path`
pub fn object_name_for(path: &Path, name: Option<String>) -> anyhow::Result<String> {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return Ok(name);
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Cannot derive an object name from {}", path.display()))
}

/// Open a local file for streaming upload, with its length when known
pub async fn open_upload(
    path: &Path,
) -> anyhow::Result<(Pin<Box<dyn AsyncRead + Send + Unpin>>, Option<u64>)> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Open {}", path.display()))?;
    let length = file.metadata().await.ok().map(|m| m.len());
    Ok((Box::pin(file), length))
}

/// Stream an opened object into a local file, returning the bytes written
pub async fn write_to_file(file: StorageFile, path: &Path) -> anyhow::Result<u64> {
    let mut reader = file.into_reader();
    let mut out = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Create {}", path.display()))?;

    let written = tokio::io::copy(&mut reader, &mut out)
        .await
        .with_context(|| format!("Write {}", path.display()))?;
    out.flush().await?;

    Ok(written)
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
