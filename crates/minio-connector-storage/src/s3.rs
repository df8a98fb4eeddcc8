use crate::client::{ObjectClient, ObjectListing, ObjectStat};
use crate::traits::{StorageError, StorageFile, StorageResult};
use async_trait::async_trait;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use minio_connector_core::{MinioSettings, DEFAULT_REGION};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::ReaderStream;

/// Streamed uploads of at least one full part go through multipart upload
const PART_SIZE: usize = 5 * 1024 * 1024; // 5MB per part (minimum is 5MB except last part)

/// `ObjectClient` backed by `aws-sdk-s3`, configured for a MinIO server
#[derive(Clone)]
pub struct S3ObjectClient {
    client: Client,
    endpoint_url: String,
}

impl S3ObjectClient {
    /// Build a client for the server described by `settings`
    ///
    /// No request is sent; connection problems surface on the first call.
    pub fn new(settings: &MinioSettings) -> Self {
        let endpoint_url = settings.endpoint_url();

        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            settings.session_token.clone(),
            None,
            "minio-connector",
        );

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        if !settings.cert_check {
            tracing::warn!(
                endpoint = %endpoint_url,
                "CERT_CHECK=false is not supported by the S3 client; TLS certificates will be verified"
            );
        }

        // MinIO serves buckets path-style: {endpoint}/{bucket}/{key}
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.signing_region().to_string()))
            .endpoint_url(&endpoint_url)
            .credentials_provider(credentials)
            .retry_config(retry_config)
            .force_path_style(true)
            .build();

        tracing::debug!(endpoint = %endpoint_url, "Created MinIO client");

        S3ObjectClient {
            client: Client::from_conf(config),
            endpoint_url,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Upload every part of a multipart upload, starting with the already-read `first_part`
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first_part: Vec<u8>,
        reader: &mut Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(Vec<CompletedPart>, u64)> {
        let mut parts = Vec::new();
        let mut total_size = 0u64;
        let mut part_number = 1i32;
        let mut part = first_part;

        loop {
            let part_len = part.len();
            total_size += part_len as u64;

            let upload_part_result = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(Bytes::from(part)))
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        part_number = part_number,
                        "Failed to upload part"
                    );
                    StorageError::UploadFailed(e.to_string())
                })?;

            let etag = upload_part_result
                .e_tag()
                .ok_or_else(|| {
                    StorageError::UploadFailed(format!("No ETag returned for part {}", part_number))
                })?
                .to_string();

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            // A short part is the last one
            if part_len < PART_SIZE {
                break;
            }

            part = read_part(reader, PART_SIZE).await?;
            if part.is_empty() {
                break;
            }
            part_number += 1;
        }

        Ok((parts, total_size))
    }
}

/// Read up to `limit` bytes, stopping early only at end of stream
async fn read_part(
    reader: &mut Pin<Box<dyn AsyncRead + Send + Unpin>>,
    limit: usize,
) -> StorageResult<Vec<u8>> {
    let mut buffer = vec![0u8; limit];
    let mut filled = 0usize;

    while filled < limit {
        let bytes_read = reader.read(&mut buffer[filled..]).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        if bytes_read == 0 {
            break; // EOF
        }

        filled += bytes_read;
    }

    buffer.truncate(filled);
    Ok(buffer)
}

fn to_chrono(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.map(|v| v.max(0) as u64)
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadBucketError::NotFound(_) => Ok(false),
                    _ => Err(StorageError::BucketError(e.to_string())),
                },
                _ => Err(StorageError::BucketError(e.to_string())),
            },
        }
    }

    async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 is the implicit location and must not be sent as a constraint
        if let Some(region) = region.filter(|r| *r != DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => match &e {
                SdkError::ServiceError(service_err)
                    if matches!(
                        service_err.err(),
                        CreateBucketError::BucketAlreadyOwnedByYou(_)
                    ) =>
                {
                    Ok(())
                }
                _ => {
                    tracing::error!(error = %e, bucket = %bucket, "Failed to create bucket");
                    Err(StorageError::BucketError(e.to_string()))
                }
            },
        }
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StorageResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %bucket, "Failed to set bucket policy");
                StorageError::BucketError(e.to_string())
            })?;

        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        Ok(())
    }

    async fn put_object_stream(
        &self,
        bucket: &str,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        content_length: Option<u64>,
        content_type: Option<&str>,
    ) -> StorageResult<u64> {
        let first_part = read_part(&mut reader, PART_SIZE).await?;

        // Everything fit in one part: single PUT
        if first_part.len() < PART_SIZE {
            let size = first_part.len() as u64;
            self.put_object(bucket, key, Bytes::from(first_part), content_type)
                .await?;
            return Ok(size);
        }

        let start = std::time::Instant::now();

        let create_result = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let upload_id = create_result
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned from S3".to_string()))?
            .to_string();

        let (parts, total_size) = match self
            .upload_parts(bucket, key, &upload_id, first_part, &mut reader)
            .await
        {
            Ok(uploaded) => uploaded,
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
                        error = %abort_err,
                        bucket = %bucket,
                        key = %key,
                        upload_id = %upload_id,
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        let part_count = parts.len();
        let completed_parts = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_parts)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = total_size,
            expected_size_bytes = ?content_length,
            parts = part_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload completed"
        );

        Ok(total_size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StorageFile> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    GetObjectError::NoSuchKey(_) => StorageError::NotFound(key.to_string()),
                    _ => {
                        tracing::error!(
                            error = %e,
                            bucket = %bucket,
                            key = %key,
                            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                            "S3 download failed"
                        );
                        StorageError::DownloadFailed(e.to_string())
                    }
                },
                _ => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let size = non_negative(response.content_length());
        let content_type = response.content_type().map(String::from);

        // Convert ByteStream to Stream<Item = Result<Bytes, StorageError>> via AsyncRead + ReaderStream
        let bucket_name = bucket.to_string();
        let object_key = key.to_string();
        let stream = ReaderStream::new(response.body.into_async_read()).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket_name,
                    key = %object_key,
                    "S3 stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(StorageFile::new(key, size, content_type, Box::pin(stream)))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectStat> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => StorageError::NotFound(key.to_string()),
                    _ => StorageError::BackendError(e.to_string()),
                },
                _ => StorageError::BackendError(e.to_string()),
            })?;

        Ok(ObjectStat {
            key: key.to_string(),
            size: non_negative(response.content_length()).unwrap_or(0),
            last_modified: response.last_modified().and_then(to_chrono),
            etag: response.e_tag().map(String::from),
            content_type: response.content_type().map(String::from),
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        Ok(())
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StorageResult<ObjectListing> {
        let mut listing = ObjectListing::default();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_delimiter(delimiter.map(String::from))
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        prefix = %prefix,
                        "S3 list failed"
                    );
                    StorageError::BackendError(e.to_string())
                })?;

            listing.prefixes.extend(
                response
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix().map(String::from)),
            );

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                listing.objects.push(ObjectStat {
                    key: key.to_string(),
                    size: non_negative(object.size()).unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_chrono),
                    etag: object.e_tag().map(String::from),
                    content_type: None,
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(listing)
    }
}
