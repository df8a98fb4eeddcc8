use crate::client::ObjectClient;
use crate::client_cache::{ClientCache, ClientKey};
use crate::minio::MinioStorage;
use crate::s3::S3ObjectClient;
use crate::traits::{Storage, StorageError, StorageResult};
use minio_connector_core::MinioSettings;
use std::sync::Arc;

/// Create a storage backend from settings
pub async fn create_storage(settings: &MinioSettings) -> StorageResult<Arc<dyn Storage>> {
    let storage = create_minio_storage(settings).await?;
    Ok(Arc::new(storage))
}

/// Create a MinioStorage whose client comes from the process-wide cache
pub async fn create_minio_storage(settings: &MinioSettings) -> StorageResult<MinioStorage> {
    settings
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let client = ClientCache::global().get_or_insert_with(ClientKey::from(settings), || {
        Ok(Arc::new(S3ObjectClient::new(settings)) as Arc<dyn ObjectClient>)
    })?;

    MinioStorage::connect(settings.clone(), client).await
}
