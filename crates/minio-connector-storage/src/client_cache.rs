//! Process-wide MinIO client cache
//!
//! Storages built from identical connection settings share one client (and therefore
//! one connection pool). Any difference in the connection fields yields a new client.

use crate::client::ObjectClient;
use crate::traits::StorageResult;
use minio_connector_core::MinioSettings;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

static GLOBAL_CLIENTS: LazyLock<ClientCache> = LazyLock::new(ClientCache::new);

/// Connection fields that identify a client
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub cert_check: bool,
}

impl From<&MinioSettings> for ClientKey {
    fn from(settings: &MinioSettings) -> Self {
        ClientKey {
            endpoint: settings.endpoint.clone(),
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
            secure: settings.secure,
            session_token: settings.session_token.clone(),
            region: settings.region.clone(),
            cert_check: settings.cert_check,
        }
    }
}

impl fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKey")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("cert_check", &self.cert_check)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ClientCache {
    clients: Mutex<HashMap<ClientKey, Arc<dyn ObjectClient>>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every storage in the process
    pub fn global() -> &'static ClientCache {
        &GLOBAL_CLIENTS
    }

    /// Return the client cached for `key`, building and caching one if there is none
    ///
    /// A failed build caches nothing.
    pub fn get_or_insert_with<F>(&self, key: ClientKey, build: F) -> StorageResult<Arc<dyn ObjectClient>>
    where
        F: FnOnce() -> StorageResult<Arc<dyn ObjectClient>>,
    {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client = build()?;
        tracing::debug!(endpoint = %key.endpoint, secure = key.secure, "Caching new MinIO client");
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use crate::traits::StorageError;
    use std::cell::Cell;

    fn settings(endpoint: &str) -> MinioSettings {
        let mut settings = MinioSettings::new(endpoint, "test_access_key", "test_secret_key", "test-bucket");
        settings.secure = false;
        settings
    }

    #[test]
    fn identical_settings_share_a_client() {
        let cache = ClientCache::new();
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok(Arc::new(MemoryClient::new()) as Arc<dyn ObjectClient>)
        };

        let first = cache
            .get_or_insert_with(ClientKey::from(&settings("test.minio.server")), build)
            .unwrap();
        let second = cache
            .get_or_insert_with(ClientKey::from(&settings("test.minio.server")), build)
            .unwrap();
        assert_eq!(builds.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        cache
            .get_or_insert_with(ClientKey::from(&settings("another.server")), build)
            .unwrap();
        assert_eq!(builds.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn any_connection_field_changes_the_key() {
        let base = settings("test.minio.server");
        let mut other = base.clone();
        other.session_token = Some("token".to_string());
        assert_ne!(ClientKey::from(&base), ClientKey::from(&other));

        let mut other = base.clone();
        other.cert_check = false;
        assert_ne!(ClientKey::from(&base), ClientKey::from(&other));

        // Bucket and URL behaviour do not affect the connection
        let mut other = base.clone();
        other.bucket_name = "another-bucket".to_string();
        other.presigned_url = false;
        assert_eq!(ClientKey::from(&base), ClientKey::from(&other));
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = ClientCache::new();
        let key = ClientKey::from(&settings("test.minio.server"));

        let result = cache.get_or_insert_with(key.clone(), || {
            Err(StorageError::ConfigError("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());

        cache
            .get_or_insert_with(key, || Ok(Arc::new(MemoryClient::new()) as Arc<dyn ObjectClient>))
            .unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn debug_hides_secret() {
        let key = ClientKey::from(&settings("test.minio.server"));
        assert!(!format!("{:?}", key).contains("test_secret_key"));
    }
}
