//! MinIO Connector Storage Library
//!
//! This crate provides the `Storage` capability interface and its MinIO implementation.
//! Every storage operation is forwarded to an `ObjectClient`, the seam between the
//! adapter and the S3 API: `S3ObjectClient` talks to a real server through
//! `aws-sdk-s3`, `MemoryClient` keeps buckets in memory.
//!
//! # Object names
//!
//! Names are S3 object keys. `/` separates "directories" for `listdir`; there is no
//! tenant or prefix rewriting, the name given to `save` is the key that is stored
//! (unless it is taken and overwriting is disabled, see `MinioStorage`).

pub mod client;
pub mod client_cache;
pub mod content_type;
pub mod factory;
pub mod memory;
pub mod minio;
pub mod names;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use client::{ObjectClient, ObjectListing, ObjectStat};
pub use client_cache::{ClientCache, ClientKey};
pub use factory::{create_minio_storage, create_storage};
pub use memory::MemoryClient;
pub use minio::MinioStorage;
pub use minio_connector_core::MinioSettings;
pub use s3::S3ObjectClient;
pub use traits::{ByteChunkStream, DirectoryListing, Storage, StorageError, StorageFile, StorageResult};
