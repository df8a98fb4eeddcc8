//! MinIO Connector Core Library
//!
//! This crate provides the connector settings shared by the storage crate and the CLI:
//! the option keys, their defaults, validation rules and bucket policy handling.

pub mod config;
pub mod policy;

// Re-export commonly used types
pub use config::{
    MinioSettings, DEFAULT_PRESIGNED_EXPIRATION_SECS, DEFAULT_REGION,
    MAX_PRESIGNED_EXPIRATION_SECS,
};
pub use policy::normalize_policy;
