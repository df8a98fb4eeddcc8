use crate::client::{ObjectClient, ObjectStat};
use crate::content_type::guess_content_type;
use crate::names::{self, DEFAULT_MAX_NAME_LENGTH, MAX_NAME_ATTEMPTS};
use crate::traits::{DirectoryListing, Storage, StorageError, StorageFile, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use minio_connector_core::MinioSettings;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;

/// MinIO storage implementation
///
/// Wraps an `ObjectClient` for the configured bucket. Object metadata read through
/// `stat` is cached per instance; `save` and `delete` evict the affected name, changes
/// made by other writers are not observed until then. A stat that was in flight while
/// an eviction happened is returned but not cached.
pub struct MinioStorage {
    client: Arc<dyn ObjectClient>,
    settings: MinioSettings,
    stat_cache: Mutex<StatCache>,
}

#[derive(Default)]
struct StatCache {
    entries: HashMap<String, ObjectStat>,
    /// Bumped on every eviction
    generation: u64,
}

impl MinioStorage {
    /// Create a MinioStorage and prepare its bucket
    ///
    /// Creates the bucket when it does not exist and applies the configured bucket
    /// policy, if any.
    pub async fn connect(
        settings: MinioSettings,
        client: Arc<dyn ObjectClient>,
    ) -> StorageResult<Self> {
        settings
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        let policy = settings
            .bucket_policy_json()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let bucket = settings.bucket_name.as_str();

        if !client.bucket_exists(bucket).await? {
            client
                .make_bucket(bucket, settings.region.as_deref())
                .await?;
            tracing::info!(bucket = %bucket, region = ?settings.region, "Created bucket");
        }

        if let Some(policy) = policy {
            client.set_bucket_policy(bucket, &policy).await?;
            tracing::info!(bucket = %bucket, "Applied bucket policy");
        }

        Ok(MinioStorage {
            client,
            settings,
            stat_cache: Mutex::new(StatCache::default()),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket_name
    }

    pub fn settings(&self) -> &MinioSettings {
        &self.settings
    }

    /// Object metadata, served from the stat cache when present
    ///
    /// Only successful lookups are cached.
    pub async fn stat(&self, name: &str) -> StorageResult<ObjectStat> {
        let generation = {
            let cache = self.lock_stat_cache();
            if let Some(stat) = cache.entries.get(name) {
                return Ok(stat.clone());
            }
            cache.generation
        };

        let start = std::time::Instant::now();
        let stat = self.client.stat_object(self.bucket(), name).await?;

        tracing::debug!(
            bucket = %self.bucket(),
            key = %name,
            size_bytes = stat.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO stat successful"
        );

        let mut cache = self.lock_stat_cache();
        if cache.generation == generation {
            cache.entries.insert(name.to_string(), stat.clone());
        }

        Ok(stat)
    }

    fn lock_stat_cache(&self) -> std::sync::MutexGuard<'_, StatCache> {
        self.stat_cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict(&self, name: &str) {
        let mut cache = self.lock_stat_cache();
        cache.entries.remove(name);
        cache.generation += 1;
    }

    async fn last_modified(&self, name: &str) -> StorageResult<DateTime<Utc>> {
        self.stat(name).await?.last_modified.ok_or_else(|| {
            StorageError::BackendError(format!("No last-modified time reported for {}", name))
        })
    }

    /// Name under which new content for `name` is stored
    async fn target_name(&self, name: &str) -> StorageResult<String> {
        validate_name(name)?;
        if !self.settings.overwrite_files && self.exists(name).await? {
            return self.get_available_name(name, None).await;
        }
        Ok(name.to_string())
    }

    /// `{scheme}://{endpoint}/{bucket}/{name}`, each path segment percent-encoded
    fn public_url(&self, name: &str) -> String {
        let encoded: Vec<_> = name.split('/').map(urlencoding::encode).collect();
        format!(
            "{}/{}/{}",
            self.settings.endpoint_url(),
            self.bucket(),
            encoded.join("/")
        )
    }
}

fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("Object name must not be empty".to_string()));
    }
    Ok(())
}

/// `/`-terminated listing prefix for a directory path; empty for the bucket root
fn directory_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[async_trait]
impl Storage for MinioStorage {
    async fn save(&self, name: &str, content: Vec<u8>) -> StorageResult<String> {
        let name = self.target_name(name).await?;
        let content_type = guess_content_type(&name);
        let size = content.len() as u64;
        let start = std::time::Instant::now();

        self.client
            .put_object(self.bucket(), &name, Bytes::from(content), content_type)
            .await?;
        self.evict(&name);

        tracing::info!(
            bucket = %self.bucket(),
            key = %name,
            size_bytes = size,
            content_type = ?content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO save successful"
        );

        Ok(name)
    }

    async fn save_stream(
        &self,
        name: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
    ) -> StorageResult<String> {
        let name = self.target_name(name).await?;
        let content_type = guess_content_type(&name);
        let start = std::time::Instant::now();

        let size = self
            .client
            .put_object_stream(self.bucket(), &name, reader, content_length, content_type)
            .await?;
        self.evict(&name);

        tracing::info!(
            bucket = %self.bucket(),
            key = %name,
            size_bytes = size,
            content_type = ?content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO stream save successful"
        );

        Ok(name)
    }

    async fn open(&self, name: &str) -> StorageResult<StorageFile> {
        validate_name(name)?;
        let start = std::time::Instant::now();

        let file = self.client.get_object(self.bucket(), name).await?;

        tracing::debug!(
            bucket = %self.bucket(),
            key = %name,
            size_bytes = ?file.size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO open successful"
        );

        Ok(file)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let start = std::time::Instant::now();

        // Evict even on failure
        let result = self.client.remove_object(self.bucket(), name).await;
        self.evict(name);
        result?;

        tracing::info!(
            bucket = %self.bucket(),
            key = %name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO delete successful"
        );

        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        match self.stat(name).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn size(&self, name: &str) -> StorageResult<u64> {
        Ok(self.stat(name).await?.size)
    }

    async fn url(&self, name: &str) -> StorageResult<String> {
        validate_name(name)?;

        if self.settings.presigned_url {
            let start = std::time::Instant::now();
            let expires_in = self.settings.presigned_expiration();
            let url = self
                .client
                .presigned_get_object(self.bucket(), name, expires_in)
                .await?;

            tracing::debug!(
                bucket = %self.bucket(),
                key = %name,
                expires_secs = expires_in.as_secs(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "MinIO presigned URL generated"
            );

            Ok(url)
        } else {
            Ok(self.public_url(name))
        }
    }

    async fn listdir(&self, path: &str) -> StorageResult<DirectoryListing> {
        let prefix = directory_prefix(path);
        let start = std::time::Instant::now();
        let listing = self
            .client
            .list_objects(self.bucket(), &prefix, Some("/"))
            .await?;

        tracing::debug!(
            bucket = %self.bucket(),
            prefix = %prefix,
            directories = listing.prefixes.len(),
            objects = listing.objects.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MinIO listdir successful"
        );

        let directories = listing
            .prefixes
            .iter()
            .filter_map(|p| p.strip_prefix(prefix.as_str()))
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();

        // The directory marker object (key == prefix) is not a file
        let files = listing
            .objects
            .iter()
            .filter_map(|o| o.key.strip_prefix(prefix.as_str()))
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        Ok(DirectoryListing { directories, files })
    }

    async fn get_available_name(
        &self,
        name: &str,
        max_length: Option<usize>,
    ) -> StorageResult<String> {
        validate_name(name)?;
        let max_length = max_length.unwrap_or(DEFAULT_MAX_NAME_LENGTH);

        if name.len() <= max_length && !self.exists(name).await? {
            return Ok(name.to_string());
        }

        // Candidates always derive from the original name, so suffixes never pile up
        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = names::candidate_name(name, max_length, names::random_suffix())?;
            if !self.exists(&candidate).await? {
                tracing::debug!(
                    bucket = %self.bucket(),
                    requested = %name,
                    available = %candidate,
                    "Picked available name"
                );
                return Ok(candidate);
            }
        }

        Err(StorageError::NameConflict(name.to_string()))
    }

    async fn accessed_time(&self, name: &str) -> StorageResult<DateTime<Utc>> {
        self.last_modified(name).await
    }

    async fn created_time(&self, name: &str) -> StorageResult<DateTime<Utc>> {
        self.last_modified(name).await
    }

    async fn modified_time(&self, name: &str) -> StorageResult<DateTime<Utc>> {
        self.last_modified(name).await
    }
}
